//! Application: collects property sources and beans, refreshes the container and runs it
//! until shutdown.

use std::sync::Arc;

use tracing::{info, warn};
use wirebox_core::{Arg, Bean, BeanBuilder, Container, Context, IntoCallable, Runtime};

use super::module::Module;
use super::runner::Runner;
use crate::config::{self, ArgsSource, EnvSource, MapSource, PropertySource};
use crate::error::AppError;

/// Bootstrap for a container-managed program.
///
/// Property sources apply in registration order, then the environment, then the command
/// line; a later write to the same key wins.
pub struct Application {
    container: Container,
    sources: Vec<Box<dyn PropertySource>>,
    env: Option<EnvSource>,
    args: Option<ArgsSource>,
}

impl Application {
    pub fn new() -> Self {
        Self {
            container: Container::new(),
            sources: Vec::new(),
            env: Some(EnvSource::new()),
            args: None,
        }
    }

    /// Sets one property, as a source of its own.
    pub fn property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.source(MapSource::new("inline").with(key, value))
    }

    pub fn source(&mut self, source: impl PropertySource + 'static) -> &mut Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Replaces the default `WIREBOX_` environment source.
    pub fn env(&mut self, env: EnvSource) -> &mut Self {
        self.env = Some(env);
        self
    }

    pub fn without_env(&mut self) -> &mut Self {
        self.env = None;
        self
    }

    pub fn args(&mut self, args: ArgsSource) -> &mut Self {
        self.args = Some(args);
        self
    }

    pub fn object<T: Bean>(&mut self, value: T) -> BeanBuilder<'_, T> {
        self.container.object(value)
    }

    pub fn provide<M, F>(&mut self, f: F, args: Vec<Arg>) -> BeanBuilder<'_, F::Output>
    where
        F: IntoCallable<M>,
        F::Output: Bean,
    {
        self.container.provide(f, args)
    }

    pub fn register(&mut self, module: &mut dyn Module) -> Result<&mut Self, AppError> {
        module.register_into(self)?;
        Ok(self)
    }

    /// Handle injected into beans; usable once the app is refreshed.
    pub fn context(&self) -> Context {
        self.container.context()
    }

    fn load_properties(&mut self) -> Result<(), AppError> {
        let sources = self
            .sources
            .iter()
            .map(|s| s.as_ref() as &dyn PropertySource)
            .chain(self.env.as_ref().map(|e| e as &dyn PropertySource))
            .chain(self.args.as_ref().map(|a| a as &dyn PropertySource));
        for source in sources {
            config::apply(self.container.properties_mut(), source)?;
        }
        Ok(())
    }

    /// Loads properties, then wires every bean.
    pub fn refresh(mut self) -> Result<Runtime, AppError> {
        self.load_properties()?;
        info!(keys = self.container.properties().keys().len(), "properties loaded");
        Ok(self.container.refresh()?)
    }

    /// Refreshes, starts the runners, waits for Ctrl-C or [`Context::shutdown`] and closes
    /// the container.
    pub async fn run(self) -> Result<(), AppError> {
        let runtime = self.refresh()?;
        let ctx = runtime.context().clone();
        let started = start_runners(&runtime, &ctx).await;
        if started.is_ok() {
            wait_for_shutdown(&ctx).await;
        }
        let closed = runtime.close();
        started?;
        closed?;
        Ok(())
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

async fn start_runners(runtime: &Runtime, ctx: &Context) -> Result<(), AppError> {
    let runners: Vec<Arc<dyn Runner>> = runtime.get("?")?;
    for runner in runners {
        info!(runner = runner.name(), "starting runner");
        runner.run(ctx).await.map_err(|source| AppError::Runner {
            runner: runner.name().to_owned(),
            source,
        })?;
    }
    Ok(())
}

async fn wait_for_shutdown(ctx: &Context) {
    if ctx.is_cancelled() {
        info!("shutdown requested");
        return;
    }
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("interrupt received, shutting down"),
            Err(e) => {
                warn!(error = %e, "can't listen for interrupt");
                ctx.cancelled().await;
            }
        },
        () = ctx.cancelled() => info!("shutdown requested"),
    }
}
