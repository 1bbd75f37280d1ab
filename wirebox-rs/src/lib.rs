//! Wirebox Rust facade: Application, property sources, Runner and derives on wirebox-core.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use self::core::{Application, Module, Runner};
pub use async_trait::async_trait;
pub use config::{ArgsSource, EnvSource, JsonSource, MapSource, PropertySource};
pub use error::AppError;
pub use logging::init_logging;
pub use wirebox_core::{
    Arg, AutowireTag, Autowire, Bean, BeanBuilder, BeanInfo, BeanStatus, BindParam, Bindable, BoxError,
    Callable, Condition, Container, Context, CoreError, ErrorKind, Lazy, Prop, Properties, Result,
    Runtime, Selector, Variadic, Wirer,
};
pub use wirebox_rs_macros::{Bean, Bindable};
