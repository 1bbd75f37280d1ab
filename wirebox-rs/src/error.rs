//! Facade errors: engine failures plus the I/O, JSON and command-line parsing around them.

use thiserror::Error;
use wirebox_core::{BoxError, CoreError, ErrorKind};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("property source '{source_name}': {reason}")]
    Source { source_name: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error("logging: {0}")]
    Logging(String),
    #[error("runner '{runner}' failed: {source}")]
    Runner {
        runner: String,
        #[source]
        source: BoxError,
    },
}

impl AppError {
    /// Engine error kind, when the failure came from the container.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Core(e) => Some(e.kind()),
            _ => None,
        }
    }

    pub(crate) fn source_error(name: &str, reason: impl std::fmt::Display) -> Self {
        AppError::Source {
            source_name: name.to_owned(),
            reason: reason.to_string(),
        }
    }
}
