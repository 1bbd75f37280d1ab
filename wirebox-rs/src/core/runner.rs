//! Runner: work started once the container is up.

use async_trait::async_trait;
use wirebox_core::{BoxError, Context};

/// Started by [`Application::run`](super::Application::run) after refresh, in injection
/// order, one after another. Long-running work should be spawned and watch
/// [`Context::cancelled`].
///
/// Publish a bean as a runner with `.export::<dyn Runner>(|r| r)`.
#[async_trait]
pub trait Runner: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, ctx: &Context) -> Result<(), BoxError>;
}
