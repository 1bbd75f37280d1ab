//! Wirebox core: property store, argument binding, conditions and bean wiring.

pub mod arg;
pub mod bean;
pub mod condition;
pub mod container;
pub mod context;
pub mod error;
pub mod expr;
pub mod inject;
pub mod path;
pub mod properties;
pub mod registry;
pub mod storage;
pub mod wire;

pub use arg::{Arg, ArgList, CallOutput, Callable, IntoCallable, Param, Prop, Variadic};
pub use bean::{Bean, BeanBuilder, BeanInfo, BeanStatus, TypeKey};
pub use condition::Condition;
pub use container::Container;
pub use context::{Context, Runtime};
pub use error::{BoxError, CoreError, ErrorKind, Result};
pub use expr::{Expr, ExprValue};
pub use inject::{Autowire, Lazy};
pub use path::{join_path, split_path, PathSegment};
pub use properties::{BindParam, Bindable, Properties};
pub use registry::{AutowireTag, Selector};
pub use storage::{Node, Storage};
pub use wire::Wirer;
