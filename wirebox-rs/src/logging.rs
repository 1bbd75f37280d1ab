//! Logging bootstrap on `tracing-subscriber`.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Environment variable whose filter directives override the level passed to
/// [`init_logging`], e.g. `WIREBOX_LOG=wirebox_core=debug`.
pub const LOG_ENV: &str = "WIREBOX_LOG";

/// Installs a global fmt subscriber at `level` (`trace`, `debug`, `info`, `warn`, `error`, `off`).
///
/// Fails on an unknown level or when a global subscriber is already set.
pub fn init_logging(level: &str) -> Result<(), AppError> {
    let filter = env_filter(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

pub(crate) fn env_filter(level: &str) -> Result<EnvFilter, AppError> {
    let default: LevelFilter = level
        .trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| AppError::Logging(format!("unknown log level '{}'", level)))?;
    Ok(EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy())
}
