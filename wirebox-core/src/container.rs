//! Container: bean registration, then refresh (resolve conditions, wire, freeze).

use std::sync::Arc;

use tracing::{debug, info};

use crate::arg::{Arg, IntoCallable};
use crate::bean::{AnyArc, Bean, BeanBuilder, BeanDefinition, BeanInfo, BeanStatus, Source, TypeKey};
use crate::condition::Condition;
use crate::context::{Context, Frozen, Runtime};
use crate::error::{catch_panic, CoreError, Result};
use crate::inject::{BeanHandle, Injector};
use crate::properties::Properties;
use crate::registry::{AutowireTag, Registry, Selector};
use crate::wire::Wirer;

/// Separator between bean ids in wiring paths.
pub const PATH_SEPARATOR: &str = " ↳ ";

/// Registration-phase container. [`Container::refresh`] consumes it and returns the
/// running [`Runtime`].
pub struct Container {
    registry: Registry,
    properties: Properties,
    context: Context,
}

impl Container {
    pub fn new() -> Self {
        Self::with_properties(Properties::new())
    }

    pub fn with_properties(properties: Properties) -> Self {
        Self {
            registry: Registry::new(),
            properties,
            context: Context::new(),
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn set_property(&mut self, key: &str, value: impl AsRef<str>) -> Result<()> {
        self.properties.set(key, value)
    }

    /// Handle that becomes usable once the container is refreshed.
    pub fn context(&self) -> Context {
        self.context.clone()
    }

    /// Registers a ready-made instance; its fields are wired during refresh.
    pub fn object<T: Bean>(&mut self, value: T) -> BeanBuilder<'_, T> {
        let idx = self.registry.push(BeanDefinition::instance(value));
        BeanBuilder::new(self.registry.bean_mut(idx))
    }

    /// Registers a constructor. Its parameters are injected from `args`; missing args
    /// autowire by parameter type. Bad args are reported by [`Container::refresh`].
    pub fn provide<M, F>(&mut self, f: F, args: Vec<Arg>) -> BeanBuilder<'_, F::Output>
    where
        F: IntoCallable<M>,
        F::Output: Bean,
    {
        let callable = f.into_callable();
        let def = match callable.bind(args) {
            Ok(list) => BeanDefinition::constructor::<F::Output>(callable, list),
            Err(e) => BeanDefinition::invalid::<F::Output>(e.to_string()),
        };
        let idx = self.registry.push(def);
        BeanBuilder::new(self.registry.bean_mut(idx))
    }

    /// Registered beans matching `selector`; conditions are not evaluated yet.
    pub fn find(&self, selector: impl Into<Selector>) -> Vec<BeanInfo> {
        let found = self.registry.find(&selector.into());
        self.registry.infos(&found)
    }

    /// Resolves conditions, wires every surviving bean and freezes the container.
    ///
    /// A wiring failure carries the path of bean ids that led to it.
    pub fn refresh(self) -> Result<Runtime> {
        let Container {
            mut registry,
            properties,
            context,
        } = self;
        let properties = Arc::new(properties);
        context.attach(properties.clone());
        info!(beans = registry.len(), "refreshing container");

        registry.resolve(&properties)?;

        let mut session = Session {
            registry,
            properties,
            context,
            stack: Vec::new(),
            order: Vec::new(),
        };
        for idx in 0..session.registry.len() {
            if session.registry.bean(idx).status() != BeanStatus::Deleted {
                session.wire_bean(idx, false)?;
            }
        }

        let Session {
            registry,
            properties,
            context,
            order,
            ..
        } = session;
        let frozen = Arc::new(Frozen {
            registry,
            properties,
        });
        context.freeze(&frozen);
        info!(beans = order.len(), "container refreshed");
        Ok(Runtime::new(frozen, order, context))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Wiring state for one refresh: the registry, the stack of beans being wired and the
/// order in which beans finished initializing.
struct Session {
    registry: Registry,
    properties: Arc<Properties>,
    context: Context,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl Session {
    fn path(&self, idxs: &[usize]) -> String {
        idxs.iter()
            .map(|&i| self.registry.bean(i).id())
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    fn cycle(&self, idx: usize) -> CoreError {
        let from = self.stack.iter().position(|&i| i == idx).unwrap_or(0);
        let mut ids = self.stack[from..].to_vec();
        ids.push(idx);
        CoreError::Cycle(self.path(&ids))
    }

    fn annotate(&self, err: CoreError) -> CoreError {
        match err {
            CoreError::Wiring { .. } => err,
            other => CoreError::Wiring {
                path: self.path(&self.stack),
                source: Box::new(other),
            },
        }
    }

    fn wire_bean(&mut self, idx: usize, lazy: bool) -> Result<()> {
        if self.context.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let bean = self.registry.bean(idx);
        match bean.status() {
            BeanStatus::Wired | BeanStatus::Initialized => return Ok(()),
            BeanStatus::Creating | BeanStatus::Created if lazy && self.stack.contains(&idx) => {
                return Ok(())
            }
            BeanStatus::Creating | BeanStatus::Created => return Err(self.cycle(idx)),
            BeanStatus::Deleted => {
                return Err(CoreError::Unresolved(format!(
                    "bean '{}' is dropped by its condition",
                    bean.id()
                )))
            }
            BeanStatus::Default | BeanStatus::Resolving => {
                return Err(CoreError::Unresolved(format!("bean '{}' is not resolved", bean.id())))
            }
            // still wiring its depends_on beans
            BeanStatus::Resolved if self.stack.contains(&idx) => return Err(self.cycle(idx)),
            BeanStatus::Resolved => {}
        }

        self.stack.push(idx);
        let result = self.build(idx).map_err(|e| self.annotate(e));
        self.stack.pop();
        result
    }

    fn build(&mut self, idx: usize) -> Result<()> {
        let depends_on = self.registry.bean(idx).depends_on.clone();
        for selector in &depends_on {
            let found = self.registry.find(selector);
            if found.is_empty() {
                return Err(CoreError::Unresolved(format!(
                    "can't find bean '{}' it depends on",
                    selector
                )));
            }
            for dep in found {
                self.wire_bean(dep, false)?;
            }
        }

        let (id, type_name, wire) = {
            let bean = self.registry.bean(idx);
            (bean.id.clone(), bean.type_name(), bean.wire)
        };
        let bean = self.registry.bean_mut(idx);
        bean.status = BeanStatus::Creating;
        let mut taken = None;
        let constructor = match &mut bean.source {
            Source::Instance(value) => {
                taken = value.take();
                None
            }
            Source::Constructor { callable, args } => Some((callable.clone(), args.clone())),
        };
        let mut instance = match constructor {
            Some((callable, args)) => callable.call(&mut *self, &args, &id, "constructor")?,
            None => taken.ok_or_else(|| CoreError::Usage(format!("bean '{}' has no instance", id)))?,
        };
        self.registry.bean_mut(idx).status = BeanStatus::Created;
        debug!(bean = %id, "bean created");

        {
            let mut wirer = Wirer::new(&mut *self, id.clone(), type_name);
            catch_panic(&id, "wire", || wire(&mut *instance, &mut wirer))?;
        }
        let instance: AnyArc = Arc::from(instance);
        let bean = self.registry.bean_mut(idx);
        if bean.slot.set(instance.clone()).is_err() {
            return Err(CoreError::Usage(format!("bean '{}' is wired twice", id)));
        }
        bean.status = BeanStatus::Wired;
        debug!(bean = %id, "bean wired");

        let hooks = bean.init.clone();
        for hook in hooks {
            catch_panic(&id, "init", || {
                hook(&instance, &self.context).map_err(|e| CoreError::lifecycle(&id, "init", e))
            })?;
        }
        self.registry.bean_mut(idx).status = BeanStatus::Initialized;
        self.order.push(idx);
        debug!(bean = %id, "bean initialized");
        Ok(())
    }
}

impl Injector for Session {
    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn context(&self) -> Context {
        self.context.clone()
    }

    fn beans(&mut self, want: TypeKey, tag: &AutowireTag, lazy: bool) -> Result<Vec<BeanHandle>> {
        let found = self.registry.select(want, tag)?;
        for &idx in &found {
            self.wire_bean(idx, lazy)?;
        }
        Ok(found
            .into_iter()
            .filter_map(|idx| self.registry.handle(idx, want))
            .collect())
    }

    fn matches(&mut self, condition: &Condition) -> Result<bool> {
        self.registry.matches(&self.properties, condition)
    }
}
