//! Error type shared by every engine module.

use thiserror::Error;

/// Error returned by user constructors, hooks and predicates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("resolve string \"{0}\" error: invalid syntax")]
    InvalidPlaceholder(String),
    #[error("invalid expression \"{expr}\": {reason}")]
    InvalidExpr { expr: String, reason: String },
    #[error("property '{path}' is a {kind} but '{key}' wants other type")]
    TypeConflict {
        path: String,
        kind: &'static str,
        key: String,
    },
    #[error("property \"{0}\" not exist")]
    PropertyNotExist(String),
    #[error("circular property reference: {0}")]
    CircularReference(String),
    #[error("bind {target} error: {reason}")]
    Bind { target: String, reason: String },
    #[error("validate failed on \"{expr}\" for value {value}")]
    Validation { expr: String, value: String },
    #[error("{0}")]
    Unresolved(String),
    #[error("found circular autowire: {0}")]
    Cycle(String),
    #[error("{hook} of bean '{bean}' failed: {reason}")]
    Lifecycle {
        bean: String,
        hook: &'static str,
        reason: String,
    },
    #[error("{0}")]
    Usage(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("{path}: {source}")]
    Wiring {
        path: String,
        #[source]
        source: Box<CoreError>,
    },
}

/// Coarse classification of [`CoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    TypeConflict,
    Unresolved,
    Cycle,
    Validation,
    Lifecycle,
    Usage,
    Cancelled,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidKey(_)
            | CoreError::InvalidPlaceholder(_)
            | CoreError::InvalidExpr { .. } => ErrorKind::Parse,
            CoreError::TypeConflict { .. } => ErrorKind::TypeConflict,
            CoreError::PropertyNotExist(_)
            | CoreError::CircularReference(_)
            | CoreError::Bind { .. }
            | CoreError::Unresolved(_) => ErrorKind::Unresolved,
            CoreError::Cycle(_) => ErrorKind::Cycle,
            CoreError::Validation { .. } => ErrorKind::Validation,
            CoreError::Lifecycle { .. } => ErrorKind::Lifecycle,
            CoreError::Usage(_) => ErrorKind::Usage,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Wiring { source, .. } => source.kind(),
        }
    }

    /// Innermost error, looking through wiring-path wrappers.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Wiring { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn bind(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        CoreError::Bind {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn lifecycle(bean: &str, hook: &'static str, reason: impl std::fmt::Display) -> Self {
        CoreError::Lifecycle {
            bean: bean.to_owned(),
            hook,
            reason: reason.to_string(),
        }
    }
}

/// Runs `f`, turning a panic into a [`CoreError::Lifecycle`] carrying the panic message.
pub(crate) fn catch_panic<T>(
    bean: &str,
    hook: &'static str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_owned()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_owned()
            };
            Err(CoreError::lifecycle(bean, hook, format!("panic: {}", reason)))
        }
    }
}
