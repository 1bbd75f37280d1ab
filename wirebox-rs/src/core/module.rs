//! Module: registers a group of beans and property sources into the app.

use super::app::Application;
use crate::error::AppError;

/// A reusable slice of configuration, applied with [`Application::register`].
pub trait Module {
    fn register_into(&mut self, app: &mut Application) -> Result<(), AppError>;
}
