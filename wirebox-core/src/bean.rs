//! Bean definitions: identity, type exports, lifecycle state and hooks.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::arg::{ArgList, Callable};
use crate::condition::Condition;
use crate::context::Context;
use crate::error::{BoxError, CoreError, Result};
use crate::registry::Selector;
use crate::wire::Wirer;

/// Type-erased shared bean instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Runtime type identity; `?Sized` so that `dyn Trait` exports have keys too.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True when `short` is the full name or its last path segment(s).
    pub fn name_matches(&self, short: &str) -> bool {
        self.name == short || self.name.ends_with(&format!("::{}", short))
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type Caster = Arc<dyn Fn(AnyArc) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// A type a bean is published under, with the conversion from the erased instance.
#[derive(Clone)]
pub struct Export {
    key: TypeKey,
    cast: Caster,
}

impl Export {
    /// The bean's own concrete type.
    pub fn of_self<T: Send + Sync + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            cast: Arc::new(|any: AnyArc| {
                any.downcast::<T>()
                    .ok()
                    .map(|t| Box::new(t) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    /// Publishes `T` as `U`, usually a `dyn Trait`.
    pub fn to<T, U>(convert: fn(Arc<T>) -> Arc<U>) -> Self
    where
        T: Send + Sync + 'static,
        U: ?Sized + Send + Sync + 'static,
    {
        Self {
            key: TypeKey::of::<U>(),
            cast: Arc::new(move |any: AnyArc| {
                any.downcast::<T>()
                    .ok()
                    .map(|t| Box::new(convert(t)) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn cast<U: ?Sized + 'static>(&self, any: AnyArc) -> Option<Arc<U>> {
        (self.cast)(any)?.downcast::<Arc<U>>().ok().map(|b| *b)
    }
}

/// Lifecycle of a bean definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BeanStatus {
    Default,
    Resolving,
    Resolved,
    Creating,
    Created,
    Wired,
    Initialized,
    Deleted,
}

/// A type the container can manage.
///
/// `#[derive(Bean)]` implements [`Bean::wire_fields`] from `#[value]`, `#[autowire]` and
/// `#[logger]` field attributes; the hooks default to no-ops.
pub trait Bean: Send + Sync + 'static {
    fn wire_fields(&mut self, wirer: &mut Wirer<'_>) -> Result<()> {
        let _ = wirer;
        Ok(())
    }

    fn on_init(&self, ctx: &Context) -> Result<(), BoxError> {
        let _ = ctx;
        Ok(())
    }

    fn on_destroy(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

pub(crate) type WireFn = fn(&mut (dyn Any + Send + Sync), &mut Wirer<'_>) -> Result<()>;
pub(crate) type InitHook = Arc<dyn Fn(&AnyArc, &Context) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type DestroyHook = Arc<dyn Fn(&AnyArc) -> Result<(), BoxError> + Send + Sync>;

fn wire_as<T: Bean>(value: &mut (dyn Any + Send + Sync), wirer: &mut Wirer<'_>) -> Result<()> {
    match value.downcast_mut::<T>() {
        Some(bean) => bean.wire_fields(wirer),
        None => Err(CoreError::Usage(format!("instance is not a {}", type_name::<T>()))),
    }
}

fn typed<T: 'static>(any: &AnyArc) -> Result<&T, BoxError> {
    any.downcast_ref::<T>()
        .ok_or_else(|| format!("instance is not a {}", type_name::<T>()).into())
}

pub(crate) enum Source {
    Instance(Option<Box<dyn Any + Send + Sync>>),
    Constructor { callable: Callable, args: ArgList },
}

/// One injectable registered with the container.
pub struct BeanDefinition {
    pub(crate) id: String,
    pub(crate) type_key: TypeKey,
    pub(crate) source: Source,
    pub(crate) condition: Option<Condition>,
    pub(crate) order: i32,
    pub(crate) depends_on: Vec<Selector>,
    pub(crate) init: Vec<InitHook>,
    pub(crate) destroy: Vec<DestroyHook>,
    pub(crate) exports: Vec<Export>,
    pub(crate) status: BeanStatus,
    pub(crate) slot: Arc<OnceLock<AnyArc>>,
    pub(crate) wire: WireFn,
    /// Registration problem reported when the container refreshes.
    pub(crate) invalid: Option<String>,
}

impl BeanDefinition {
    fn new<T: Bean>(source: Source) -> Self {
        Self {
            id: type_name::<T>().to_owned(),
            type_key: TypeKey::of::<T>(),
            source,
            condition: None,
            order: 0,
            depends_on: Vec::new(),
            init: vec![Arc::new(|any: &AnyArc, ctx: &Context| typed::<T>(any)?.on_init(ctx))],
            destroy: vec![Arc::new(|any: &AnyArc| typed::<T>(any)?.on_destroy())],
            exports: vec![Export::of_self::<T>()],
            status: BeanStatus::Default,
            slot: Arc::new(OnceLock::new()),
            wire: wire_as::<T>,
            invalid: None,
        }
    }

    pub(crate) fn instance<T: Bean>(value: T) -> Self {
        Self::new::<T>(Source::Instance(Some(Box::new(value))))
    }

    pub(crate) fn constructor<T: Bean>(callable: Callable, args: ArgList) -> Self {
        Self::new::<T>(Source::Constructor { callable, args })
    }

    pub(crate) fn invalid<T: Bean>(reason: String) -> Self {
        let mut def = Self::new::<T>(Source::Instance(None));
        def.invalid = Some(reason);
        def
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_key.name()
    }

    pub fn status(&self) -> BeanStatus {
        self.status
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn exports(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.exports.iter().map(Export::key)
    }

    pub(crate) fn export_for(&self, key: TypeKey) -> Option<&Export> {
        self.exports.iter().find(|e| e.key == key)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.status != BeanStatus::Deleted
    }

    pub fn info(&self) -> BeanInfo {
        BeanInfo {
            id: self.id.clone(),
            type_name: self.type_name(),
            order: self.order,
            status: self.status,
        }
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("id", &self.id)
            .field("type", &self.type_key)
            .field("status", &self.status)
            .field("order", &self.order)
            .finish()
    }
}

/// Summary of a bean returned by `find`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeanInfo {
    pub id: String,
    pub type_name: &'static str,
    pub order: i32,
    pub status: BeanStatus,
}

/// Typed view over a freshly registered definition.
pub struct BeanBuilder<'a, T> {
    def: &'a mut BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Bean> BeanBuilder<'a, T> {
    pub(crate) fn new(def: &'a mut BeanDefinition) -> Self {
        Self {
            def,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    /// Overrides the default id (the full type name).
    pub fn name(self, id: impl Into<String>) -> Self {
        self.def.id = id.into();
        self
    }

    /// Registers the bean only when `condition` holds at refresh time.
    pub fn on(self, condition: Condition) -> Self {
        self.def.condition = Some(match self.def.condition.take() {
            Some(existing) => Condition::And(vec![existing, condition]),
            None => condition,
        });
        self
    }

    /// Position in auto-ordered collection injection; lower first.
    pub fn order(self, order: i32) -> Self {
        self.def.order = order;
        self
    }

    pub fn depends_on(self, selector: impl Into<Selector>) -> Self {
        self.def.depends_on.push(selector.into());
        self
    }

    pub fn init<E, F>(self, hook: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn(&T, &Context) -> Result<(), E> + Send + Sync + 'static,
    {
        self.def.init.push(Arc::new(move |any: &AnyArc, ctx: &Context| {
            hook(typed::<T>(any)?, ctx).map_err(Into::into)
        }));
        self
    }

    pub fn destroy<E, F>(self, hook: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn(&T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.def.destroy.push(Arc::new(move |any: &AnyArc| {
            hook(typed::<T>(any)?).map_err(Into::into)
        }));
        self
    }

    /// Publishes the bean under `U`, e.g. `.export(|b: Arc<Foo>| -> Arc<dyn Greeter> { b })`.
    pub fn export<U>(self, convert: fn(Arc<T>) -> Arc<U>) -> Self
    where
        U: ?Sized + Send + Sync + 'static,
    {
        let export = Export::to::<T, U>(convert);
        if self.def.export_for(export.key()).is_none() {
            self.def.exports.push(export);
        }
        self
    }
}
