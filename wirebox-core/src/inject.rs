//! Injection seam shared by field wiring, constructor arguments and the runtime context.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::bean::{AnyArc, Export, TypeKey};
use crate::condition::Condition;
use crate::context::Context;
use crate::error::{CoreError, Result};
use crate::properties::Properties;
use crate::registry::AutowireTag;

/// A selected bean: its id, its instance slot and the export it was selected through.
#[derive(Clone)]
pub struct BeanHandle {
    pub(crate) id: String,
    pub(crate) slot: Arc<OnceLock<AnyArc>>,
    pub(crate) export: Export,
}

impl BeanHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The instance as `U`; `None` until the bean has been created and wired.
    pub fn get<U: ?Sized + 'static>(&self) -> Option<Arc<U>> {
        let any = self.slot.get()?.clone();
        self.export.cast::<U>(any)
    }

    fn require<U: ?Sized + 'static>(&self) -> Result<Arc<U>> {
        self.get::<U>()
            .ok_or_else(|| CoreError::Unresolved(format!("bean '{}' is not wired yet", self.id)))
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanHandle")
            .field("id", &self.id)
            .field("export", &self.export.key())
            .finish()
    }
}

/// Source of injected values during wiring or at runtime.
pub trait Injector {
    fn properties(&self) -> &Properties;

    fn context(&self) -> Context;

    /// Beans injectable as `want` for `tag`, wired first when needed.
    ///
    /// With `lazy`, a bean that is still being wired is returned with an empty slot
    /// instead of being reported as a cycle.
    fn beans(&mut self, want: TypeKey, tag: &AutowireTag, lazy: bool) -> Result<Vec<BeanHandle>>;

    fn matches(&mut self, condition: &Condition) -> Result<bool>;
}

/// A field or argument type the container can fill with beans.
pub trait Autowire: Sized {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self>;
}

fn none_found(want: TypeKey, tag: &AutowireTag) -> CoreError {
    CoreError::Unresolved(format!("can't find bean, tag=\"{}\" type={}", tag, want.name()))
}

fn at_most_one<T: ?Sized + 'static>(
    injector: &mut dyn Injector,
    tag: &AutowireTag,
    lazy: bool,
) -> Result<Option<BeanHandle>> {
    let want = TypeKey::of::<T>();
    let mut found = injector.beans(want, tag, lazy)?;
    match found.len() {
        0 if tag.optional => Ok(None),
        0 => Err(none_found(want, tag)),
        1 => Ok(found.pop()),
        n => {
            let ids: Vec<&str> = found.iter().map(BeanHandle::id).collect();
            Err(CoreError::Unresolved(format!(
                "found {} beans, tag=\"{}\" type={}: [{}]",
                n,
                tag,
                want.name(),
                ids.join(", ")
            )))
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Autowire for Arc<T> {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        let required = AutowireTag {
            optional: false,
            ..tag.clone()
        };
        match at_most_one::<T>(injector, &required, false)? {
            Some(handle) => handle.require::<T>(),
            None => Err(none_found(TypeKey::of::<T>(), tag)),
        }
    }
}

/// Exactly one bean unless the tag ends in `?`.
impl<T: ?Sized + Send + Sync + 'static> Autowire for Option<Arc<T>> {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        at_most_one::<T>(injector, tag, false)?
            .map(|h| h.require::<T>())
            .transpose()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Autowire for Vec<Arc<T>> {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        let want = TypeKey::of::<T>();
        let found = injector.beans(want, tag, false)?;
        if found.is_empty() && !tag.optional {
            return Err(none_found(want, tag));
        }
        found.iter().map(BeanHandle::require::<T>).collect()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Autowire for HashMap<String, Arc<T>> {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        let want = TypeKey::of::<T>();
        let found = injector.beans(want, tag, false)?;
        if found.is_empty() && !tag.optional {
            return Err(none_found(want, tag));
        }
        found
            .iter()
            .map(|h| Ok((h.id.clone(), h.require::<T>()?)))
            .collect()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Autowire for Lazy<T> {
    fn autowire(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        Ok(Lazy {
            handle: at_most_one::<T>(injector, tag, true)?,
            _marker: PhantomData,
        })
    }
}

impl Autowire for Context {
    fn autowire(injector: &mut dyn Injector, _tag: &AutowireTag) -> Result<Self> {
        Ok(injector.context())
    }
}

/// Reference to a bean that may still be wiring when the reference is taken.
///
/// Lets two beans point at each other through fields; [`Lazy::get`] succeeds once the
/// target has been wired. A field-only cycle needs a `Lazy` on at least one side: when
/// every back-edge is an `Arc<T>` or `Option<Arc<T>>`, refresh reports a `Cycle`.
pub struct Lazy<T: ?Sized> {
    handle: Option<BeanHandle>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> Lazy<T> {
    pub fn get(&self) -> Option<Arc<T>> {
        self.handle.as_ref()?.get::<T>()
    }

    pub fn id(&self) -> Option<&str> {
        self.handle.as_ref().map(BeanHandle::id)
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }
}

impl<T: ?Sized> Default for Lazy<T> {
    fn default() -> Self {
        Self {
            handle: None,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.handle {
            Some(h) => write!(f, "Lazy({})", h.id),
            None => f.write_str("Lazy(None)"),
        }
    }
}
