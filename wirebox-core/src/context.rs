//! Runtime handle to a refreshed container, and the shutdown path.

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};

use crate::arg::{Arg, IntoCallable};
use crate::bean::{Bean, BeanInfo, TypeKey};
use crate::condition::Condition;
use crate::error::{catch_panic, CoreError, Result};
use crate::inject::{Autowire, BeanHandle, Injector};
use crate::properties::{Bindable, Properties};
use crate::registry::{AutowireTag, Registry, Selector};
use crate::wire::Wirer;

/// State that stays read-only once every bean is wired.
pub(crate) struct Frozen {
    pub(crate) registry: Registry,
    pub(crate) properties: Arc<Properties>,
}

struct Shared {
    properties: OnceLock<Arc<Properties>>,
    frozen: OnceLock<Weak<Frozen>>,
    cancel: CancellationToken,
}

/// Cloneable handle injected into beans and hooks.
///
/// Properties are readable from the start of refresh; bean lookups, `invoke` and `wire`
/// work only after the container is frozen and until it is closed.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                properties: OnceLock::new(),
                frozen: OnceLock::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn attach(&self, properties: Arc<Properties>) {
        let _ = self.shared.properties.set(properties);
    }

    pub(crate) fn freeze(&self, frozen: &Arc<Frozen>) {
        let _ = self.shared.frozen.set(Arc::downgrade(frozen));
    }

    fn frozen(&self) -> Result<Arc<Frozen>> {
        self.shared
            .frozen
            .get()
            .ok_or_else(|| CoreError::Usage("container is not refreshed yet".into()))?
            .upgrade()
            .ok_or_else(|| CoreError::Usage("container is closed".into()))
    }

    pub fn properties(&self) -> Result<Arc<Properties>> {
        self.shared
            .properties
            .get()
            .cloned()
            .ok_or_else(|| CoreError::Usage("properties are not loaded yet".into()))
    }

    /// Raw value at `key`.
    pub fn prop(&self, key: &str) -> Option<String> {
        self.shared.properties.get()?.get(key).map(str::to_owned)
    }

    pub fn keys(&self) -> Vec<String> {
        self.shared
            .properties
            .get()
            .map(|p| p.keys())
            .unwrap_or_default()
    }

    pub fn bind<T: Bindable>(&self, tag: &str) -> Result<T> {
        self.properties()?.bind(tag)
    }

    pub fn find(&self, selector: impl Into<Selector>) -> Result<Vec<BeanInfo>> {
        let frozen = self.frozen()?;
        let found = frozen.registry.find(&selector.into());
        Ok(frozen.registry.infos(&found))
    }

    /// Looks up beans the way an `#[autowire(tag)]` field of type `T` would.
    pub fn get<T: Autowire>(&self, tag: &str) -> Result<T> {
        let frozen = self.frozen()?;
        let tag = AutowireTag::parse(tag)?;
        T::autowire(&mut self.live(&frozen), &tag)
    }

    /// Calls `f` with its parameters injected from the container.
    pub fn invoke<M, F: IntoCallable<M>>(&self, f: F, args: Vec<Arg>) -> Result<F::Output> {
        let frozen = self.frozen()?;
        let callable = f.into_callable();
        callable.call_as::<F::Output>(&mut self.live(&frozen), args, callable.name())
    }

    /// Wires the fields of a bean that is not registered with the container, then runs its
    /// init hook. Destroy hooks of such beans are not tracked.
    pub fn wire<T: Bean>(&self, mut value: T) -> Result<Arc<T>> {
        let frozen = self.frozen()?;
        let id = type_name::<T>();
        let mut live = self.live(&frozen);
        let mut wirer = Wirer::new(&mut live, id.to_owned(), id);
        catch_panic(id, "wire", || value.wire_fields(&mut wirer))?;
        catch_panic(id, "init", || {
            value
                .on_init(self)
                .map_err(|e| CoreError::lifecycle(id, "init", e))
        })?;
        Ok(Arc::new(value))
    }

    fn live<'a>(&self, frozen: &'a Frozen) -> Live<'a> {
        Live {
            frozen,
            context: self.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Completes once [`Context::shutdown`] is called or the container is closed.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.shared.cancel.cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Requests shutdown. Beans still wiring fail with `Cancelled`.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("frozen", &self.shared.frozen.get().is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Injector over the frozen registry; every bean is already wired.
struct Live<'a> {
    frozen: &'a Frozen,
    context: Context,
}

impl Injector for Live<'_> {
    fn properties(&self) -> &Properties {
        &self.frozen.properties
    }

    fn context(&self) -> Context {
        self.context.clone()
    }

    fn beans(&mut self, want: TypeKey, tag: &AutowireTag, _lazy: bool) -> Result<Vec<BeanHandle>> {
        let registry = &self.frozen.registry;
        Ok(registry
            .select(want, tag)?
            .into_iter()
            .filter_map(|idx| registry.handle(idx, want))
            .collect())
    }

    fn matches(&mut self, condition: &Condition) -> Result<bool> {
        self.frozen
            .registry
            .matches(&self.frozen.properties, condition)
    }
}

/// A refreshed container. Dropping it without [`Runtime::close`] skips destroy hooks.
pub struct Runtime {
    frozen: Arc<Frozen>,
    order: Vec<usize>,
    context: Context,
}

impl Runtime {
    pub(crate) fn new(frozen: Arc<Frozen>, order: Vec<usize>, context: Context) -> Self {
        Self {
            frozen,
            order,
            context,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn properties(&self) -> &Properties {
        &self.frozen.properties
    }

    pub fn get<T: Autowire>(&self, tag: &str) -> Result<T> {
        self.context.get(tag)
    }

    pub fn find(&self, selector: impl Into<Selector>) -> Vec<BeanInfo> {
        let found = self.frozen.registry.find(&selector.into());
        self.frozen.registry.infos(&found)
    }

    /// Beans in initialization order.
    pub fn beans(&self) -> Vec<BeanInfo> {
        self.frozen.registry.infos(&self.order)
    }

    /// Runs destroy hooks in reverse initialization order, then cancels the context.
    ///
    /// Every hook runs even if an earlier one fails; the first failure is returned.
    pub fn close(self) -> Result<()> {
        let registry = &self.frozen.registry;
        let mut first = None;
        for &idx in self.order.iter().rev() {
            let Some(bean) = registry.get(idx) else {
                continue;
            };
            let Some(instance) = bean.slot.get() else {
                continue;
            };
            for hook in &bean.destroy {
                let result = catch_panic(&bean.id, "destroy", || {
                    hook(instance).map_err(|e| CoreError::lifecycle(&bean.id, "destroy", e))
                });
                if let Err(e) = result {
                    warn!(bean = %bean.id, error = %e, "destroy hook failed");
                    first.get_or_insert(e);
                }
            }
            debug!(bean = %bean.id, "bean destroyed");
        }
        self.context.shutdown();
        info!(beans = self.order.len(), "container closed");
        first.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("beans", &self.order.len())
            .field("context", &self.context)
            .finish()
    }
}
