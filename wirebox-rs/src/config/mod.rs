//! Property sources: in-memory pairs, JSON documents, environment and command line.
//!
//! Sources are applied in order; a later write to the same key wins.

pub mod args;
pub mod env;
pub mod source;

pub use args::ArgsSource;
pub use env::{EnvSource, DEFAULT_ENV_PREFIX};
pub use source::{flatten_json, JsonSource, MapSource, PropertySource};

use tracing::debug;
use wirebox_core::Properties;

use crate::error::AppError;

/// Writes everything `source` yields into `props`; returns the number of pairs written.
pub fn apply(props: &mut Properties, source: &dyn PropertySource) -> Result<usize, AppError> {
    let pairs = source.load(props)?;
    for (key, value) in &pairs {
        props
            .set(key, value)
            .map_err(|e| AppError::source_error(source.name(), e))?;
    }
    debug!(source = source.name(), count = pairs.len(), "properties loaded");
    Ok(pairs.len())
}

/// Builds a fresh property store from `sources`, in order.
pub fn load<'a>(sources: impl IntoIterator<Item = &'a dyn PropertySource>) -> Result<Properties, AppError> {
    let mut props = Properties::new();
    for source in sources {
        apply(&mut props, source)?;
    }
    Ok(props)
}
