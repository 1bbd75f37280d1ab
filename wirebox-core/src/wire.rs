//! Field wiring handle passed to [`Bean::wire_fields`](crate::Bean::wire_fields).

use tracing::Span;

use crate::context::Context;
use crate::error::Result;
use crate::inject::{Autowire, Injector};
use crate::properties::{BindParam, Bindable};
use crate::registry::AutowireTag;

pub struct Wirer<'a> {
    injector: &'a mut dyn Injector,
    bean_id: String,
    type_name: &'static str,
}

impl<'a> Wirer<'a> {
    pub(crate) fn new(injector: &'a mut dyn Injector, bean_id: String, type_name: &'static str) -> Self {
        Self {
            injector,
            bean_id,
            type_name,
        }
    }

    pub fn bean_id(&self) -> &str {
        &self.bean_id
    }

    /// Binds `#[value("${key:=default}")]`, then checks the optional `expr` predicate.
    pub fn value<T: Bindable>(&mut self, field: &str, tag: &str, validate: Option<&str>) -> Result<T> {
        let short = self.type_name.rsplit("::").next().unwrap_or(self.type_name);
        let param = BindParam::from_tag(tag)?
            .with_validate(validate)
            .with_path(format!("{}.{}", short, field));
        self.injector.properties().bind_param(&param)
    }

    /// Resolves `#[autowire("selectors[?]")]`.
    ///
    /// An `Arc<T>` or `Option<Arc<T>>` field needs its target fully wired, so a field
    /// pointing back at a bean still on the wiring stack is a `Cycle`; use [`Lazy`] there.
    ///
    /// [`Lazy`]: crate::Lazy
    pub fn autowire<T: Autowire>(&mut self, field: &str, tag: &str) -> Result<T> {
        let parsed = AutowireTag::parse(tag)?;
        tracing::trace!(bean = %self.bean_id, field, tag, "autowire field");
        T::autowire(&mut *self.injector, &parsed)
    }

    /// Span for `#[logger]` fields, named `bean` and carrying the owner's id and type name.
    pub fn logger(&self) -> Span {
        tracing::info_span!("bean", id = %self.bean_id, type_name = self.type_name)
    }

    pub fn context(&self) -> Context {
        self.injector.context()
    }
}
