//! Argument binding for constructors and invoked functions.
//!
//! A [`Callable`] wraps a plain Rust function whose parameters implement [`Param`]. Binding
//! an `Arg` vector places every argument into a parameter slot; calling the callable
//! resolves each slot against an [`Injector`].

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bean::TypeKey;
use crate::condition::Condition;
use crate::context::Context;
use crate::error::{catch_panic, BoxError, CoreError, Result};
use crate::inject::{Autowire, Injector, Lazy};
use crate::properties::Bindable;
use crate::registry::{AutowireTag, Selector};

type Boxed = Box<dyn Any + Send + Sync>;
type ValueFn = Arc<dyn Fn() -> Boxed + Send + Sync>;
type InvokeFn = Arc<dyn Fn(&mut dyn Injector, &ArgList) -> Result<Result<Boxed, BoxError>> + Send + Sync>;

/// One argument for a callable slot.
#[derive(Clone)]
pub enum Arg {
    /// A fixed value; the parameter type must match exactly.
    Value(ValueFn),
    /// The zero value of the parameter type.
    Nil,
    /// `${...}` or `$key` binds from properties; anything else (including `""`) is an
    /// autowire tag.
    Expr(String),
    /// Autowire by selector.
    Bean(AutowireTag),
    /// Places the inner arg at a fixed slot.
    Index(usize, Box<Arg>),
    /// Conditional value computed by a nested callable; appended to the variadic tail.
    Option(Box<OptionArg>),
    /// Value computed by a nested callable.
    Call(Callable, Vec<Arg>),
}

#[derive(Clone, Debug)]
pub struct OptionArg {
    callable: Callable,
    args: Vec<Arg>,
    condition: Option<Condition>,
}

impl Arg {
    pub fn value<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Arg::Value(Arc::new(move || Box::new(value.clone()) as Boxed))
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        Arg::Expr(expr.into())
    }

    pub fn bean(selector: impl Into<Selector>) -> Self {
        Arg::Bean(AutowireTag::from(selector.into()))
    }

    pub fn index(idx: usize, arg: impl Into<Arg>) -> Self {
        Arg::Index(idx, Box::new(arg.into()))
    }

    pub fn option<M, F: IntoCallable<M>>(f: F, args: Vec<Arg>) -> Self {
        Arg::Option(Box::new(OptionArg {
            callable: f.into_callable(),
            args,
            condition: None,
        }))
    }

    pub fn call<M, F: IntoCallable<M>>(f: F, args: Vec<Arg>) -> Self {
        Arg::Call(f.into_callable(), args)
    }

    /// Adds a condition to an `Option` arg; other args are returned unchanged.
    pub fn on(self, condition: Condition) -> Self {
        match self {
            Arg::Option(mut opt) => {
                opt.condition = Some(match opt.condition.take() {
                    Some(existing) => existing.and(condition),
                    None => condition,
                });
                Arg::Option(opt)
            }
            other => other,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Expr(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Expr(s)
    }
}

impl From<Selector> for Arg {
    fn from(selector: Selector) -> Self {
        Arg::bean(selector)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(_) => f.write_str("Value(..)"),
            Arg::Nil => f.write_str("Nil"),
            Arg::Expr(s) => f.debug_tuple("Expr").field(s).finish(),
            Arg::Bean(tag) => f.debug_tuple("Bean").field(tag).finish(),
            Arg::Index(i, arg) => f.debug_tuple("Index").field(i).field(arg).finish(),
            Arg::Option(opt) => f.debug_tuple("Option").field(opt).finish(),
            Arg::Call(c, args) => f.debug_tuple("Call").field(c).field(args).finish(),
        }
    }
}

/// Arguments placed into a callable's slots.
#[derive(Clone, Debug, Default)]
pub struct ArgList {
    slots: Vec<Arg>,
    tail: Vec<Arg>,
}

impl ArgList {
    pub fn slots(&self) -> &[Arg] {
        &self.slots
    }

    pub fn tail(&self) -> &[Arg] {
        &self.tail
    }
}

/// Parameter metadata kept for binding and diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct ParamInfo {
    pub type_name: &'static str,
    pub variadic: bool,
}

impl ParamInfo {
    fn of<P: Param>() -> Self {
        Self {
            type_name: type_name::<P>(),
            variadic: P::VARIADIC,
        }
    }
}

/// Type-erased function with injectable parameters.
#[derive(Clone)]
pub struct Callable {
    name: &'static str,
    params: Vec<ParamInfo>,
    output: TypeKey,
    invoke: InvokeFn,
}

impl Callable {
    pub fn new<M, F: IntoCallable<M>>(f: F) -> Self {
        f.into_callable()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.params
    }

    pub fn output(&self) -> TypeKey {
        self.output
    }

    fn is_variadic(&self) -> bool {
        self.params.last().map_or(false, |p| p.variadic)
    }

    /// Places `args` into slots.
    ///
    /// Either every non-`Option` arg is `Index`ed or none is. Unfilled slots default to
    /// `Expr("")`, i.e. autowire by parameter type.
    pub fn bind(&self, args: Vec<Arg>) -> Result<ArgList> {
        if let Some(p) = self.params[..self.params.len().saturating_sub(1)]
            .iter()
            .find(|p| p.variadic)
        {
            return Err(CoreError::Usage(format!(
                "{}: variadic parameter {} must be the last one",
                self.name, p.type_name
            )));
        }
        let variadic = self.is_variadic();
        let fixed = self.params.len() - usize::from(variadic);
        let indexed = args
            .iter()
            .find(|a| !matches!(a, Arg::Option(_)))
            .map_or(false, |a| matches!(a, Arg::Index(..)));

        let mut slots: Vec<Option<Arg>> = vec![None; fixed];
        let mut tail = Vec::new();
        let mut next = 0;
        for arg in args {
            match arg {
                Arg::Option(_) if variadic => tail.push(arg),
                Arg::Option(_) => {
                    return Err(CoreError::Usage(format!(
                        "{}: option args need a variadic parameter",
                        self.name
                    )))
                }
                Arg::Index(idx, inner) => {
                    if !indexed {
                        return Err(self.mixed());
                    }
                    let slot = slots.get_mut(idx).ok_or_else(|| {
                        CoreError::Usage(format!("{}: arg index {} out of range", self.name, idx))
                    })?;
                    if slot.is_some() {
                        return Err(CoreError::Usage(format!(
                            "{}: arg index {} is already set",
                            self.name, idx
                        )));
                    }
                    *slot = Some(*inner);
                }
                other => {
                    if indexed {
                        return Err(self.mixed());
                    }
                    if next < fixed {
                        slots[next] = Some(other);
                        next += 1;
                    } else if variadic {
                        tail.push(other);
                    } else {
                        return Err(CoreError::Usage(format!(
                            "{}: too many args, want {}",
                            self.name, fixed
                        )));
                    }
                }
            }
        }
        Ok(ArgList {
            slots: slots
                .into_iter()
                .map(|s| s.unwrap_or_else(|| Arg::Expr(String::new())))
                .collect(),
            tail,
        })
    }

    fn mixed(&self) -> CoreError {
        CoreError::Usage(format!("{}: can't mix indexed and positional args", self.name))
    }

    /// Resolves every slot and calls the function; user errors and panics become
    /// `Lifecycle` errors attributed to `owner`.
    pub fn call(
        &self,
        injector: &mut dyn Injector,
        args: &ArgList,
        owner: &str,
        hook: &'static str,
    ) -> Result<Boxed> {
        catch_panic(owner, hook, || match (self.invoke)(injector, args)? {
            Ok(value) => Ok(value),
            Err(e) => Err(CoreError::lifecycle(owner, hook, e)),
        })
    }

    /// Binds `args`, calls, and downcasts the result to `T`.
    pub(crate) fn call_as<T: 'static>(
        &self,
        injector: &mut dyn Injector,
        args: Vec<Arg>,
        owner: &str,
    ) -> Result<T> {
        let list = self.bind(args)?;
        let out = self.call(injector, &list, owner, "call")?;
        out.downcast::<T>().map(|b| *b).map_err(|_| {
            CoreError::Usage(format!(
                "{} returns {}, wanted {}",
                self.name,
                self.output.name(),
                type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("output", &self.output)
            .finish()
    }
}

/// Return type of a callable: `()` or `Result<T, E>`.
pub trait CallOutput {
    type Value: Send + Sync + 'static;
    fn into_result(self) -> Result<Self::Value, BoxError>;
}

impl CallOutput for () {
    type Value = ();

    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T, E> CallOutput for Result<T, E>
where
    T: Send + Sync + 'static,
    E: Into<BoxError>,
{
    type Value = T;

    fn into_result(self) -> Result<T, BoxError> {
        self.map_err(Into::into)
    }
}

/// Function types usable as a [`Callable`]; `M` is a marker for the signature.
pub trait IntoCallable<M>: Send + Sync + 'static {
    type Output: Send + Sync + 'static;
    fn into_callable(self) -> Callable;
}

macro_rules! impl_into_callable {
    ($($P:ident),*) => {
        impl<F, R, $($P,)*> IntoCallable<(R, $($P,)*)> for F
        where
            F: Fn($($P),*) -> R + Send + Sync + 'static,
            R: CallOutput,
            $($P: Param,)*
        {
            type Output = R::Value;

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn into_callable(self) -> Callable {
                let invoke: InvokeFn = Arc::new(move |injector: &mut dyn Injector, args: &ArgList| {
                    let mut slot = 0usize;
                    $(
                        let $P = <$P as Param>::resolve(injector, args, slot)?;
                        slot += 1;
                    )*
                    Ok((self)($($P),*).into_result().map(|v| Box::new(v) as Boxed))
                });
                Callable {
                    name: type_name::<F>(),
                    params: vec![$(ParamInfo::of::<$P>()),*],
                    output: TypeKey::of::<R::Value>(),
                    invoke,
                }
            }
        }
    };
}

impl_into_callable!();
impl_into_callable!(A0);
impl_into_callable!(A0, A1);
impl_into_callable!(A0, A1, A2);
impl_into_callable!(A0, A1, A2, A3);
impl_into_callable!(A0, A1, A2, A3, A4);
impl_into_callable!(A0, A1, A2, A3, A4, A5);
impl_into_callable!(A0, A1, A2, A3, A4, A5, A6);
impl_into_callable!(A0, A1, A2, A3, A4, A5, A6, A7);
impl_into_callable!(A0, A1, A2, A3, A4, A5, A6, A7, A8);
impl_into_callable!(A0, A1, A2, A3, A4, A5, A6, A7, A8, A9);

/// A parameter type a callable can receive.
pub trait Param: Sized + 'static {
    /// Set by [`Variadic`]; only the last parameter may be variadic.
    const VARIADIC: bool = false;

    fn resolve(injector: &mut dyn Injector, args: &ArgList, slot: usize) -> Result<Self> {
        match args.slots.get(slot) {
            Some(arg) => Self::from_arg(injector, arg),
            None => Self::from_bean(injector, &AutowireTag::default()),
        }
    }

    fn from_arg(injector: &mut dyn Injector, arg: &Arg) -> Result<Self> {
        match arg {
            Arg::Value(make) => make().downcast::<Self>().map(|b| *b).map_err(|_| {
                CoreError::Usage(format!("arg value is not a {}", type_name::<Self>()))
            }),
            Arg::Nil => Self::from_nil(),
            Arg::Expr(s) if is_property_expr(s) => Self::from_property(injector, s),
            Arg::Expr(s) => Self::from_bean(injector, &AutowireTag::parse(s)?),
            Arg::Bean(tag) => Self::from_bean(injector, tag),
            Arg::Index(_, inner) => Self::from_arg(injector, inner),
            Arg::Option(opt) => match eval_option::<Self>(injector, opt)? {
                Some(value) => Ok(value),
                None => Self::from_nil(),
            },
            Arg::Call(callable, args) => callable.call_as::<Self>(injector, args.clone(), callable.name),
        }
    }

    fn from_nil() -> Result<Self> {
        Err(CoreError::Usage(format!("{} has no zero value", type_name::<Self>())))
    }

    fn from_property(injector: &mut dyn Injector, expr: &str) -> Result<Self> {
        let _ = injector;
        Err(CoreError::Usage(format!(
            "{} can't be bound from property {:?}",
            type_name::<Self>(),
            expr
        )))
    }

    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        let _ = injector;
        Err(CoreError::Usage(format!(
            "{} can't be autowired (tag \"{}\")",
            type_name::<Self>(),
            tag
        )))
    }
}

fn is_property_expr(s: &str) -> bool {
    s.contains("${") || s.trim_start().starts_with('$')
}

fn eval_option<T: 'static>(injector: &mut dyn Injector, opt: &OptionArg) -> Result<Option<T>> {
    if let Some(cond) = &opt.condition {
        if !injector.matches(cond)? {
            return Ok(None);
        }
    }
    opt.callable
        .call_as::<T>(injector, opt.args.clone(), opt.callable.name)
        .map(Some)
}

macro_rules! property_params {
    ($($t:ty),* $(,)?) => {
        $(
            impl Param for $t {
                fn from_nil() -> Result<Self> {
                    Ok(Default::default())
                }

                fn from_property(injector: &mut dyn Injector, expr: &str) -> Result<Self> {
                    injector.properties().bind_expr(expr)
                }
            }

            impl Param for Option<$t> {
                fn from_nil() -> Result<Self> {
                    Ok(None)
                }

                fn from_property(injector: &mut dyn Injector, expr: &str) -> Result<Self> {
                    injector.properties().bind_expr(expr)
                }
            }

            impl Param for Vec<$t> {
                fn from_nil() -> Result<Self> {
                    Ok(Vec::new())
                }

                fn from_property(injector: &mut dyn Injector, expr: &str) -> Result<Self> {
                    injector.properties().bind_expr(expr)
                }
            }
        )*
    };
}

property_params!(bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, Duration);

impl<T: ?Sized + Send + Sync + 'static> Param for Arc<T> {
    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        Arc::<T>::autowire(injector, tag)
    }
}

/// Missing beans are allowed for `Option` parameters.
impl<T: ?Sized + Send + Sync + 'static> Param for Option<Arc<T>> {
    fn from_nil() -> Result<Self> {
        Ok(None)
    }

    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        let tag = AutowireTag {
            optional: true,
            ..tag.clone()
        };
        Option::<Arc<T>>::autowire(injector, &tag)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Param for Vec<Arc<T>> {
    fn from_nil() -> Result<Self> {
        Ok(Vec::new())
    }

    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        Vec::<Arc<T>>::autowire(injector, tag)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Param for HashMap<String, Arc<T>> {
    fn from_nil() -> Result<Self> {
        Ok(HashMap::new())
    }

    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        HashMap::<String, Arc<T>>::autowire(injector, tag)
    }
}

impl<T: ?Sized + Send + Sync + 'static> Param for Lazy<T> {
    fn from_nil() -> Result<Self> {
        Ok(Lazy::default())
    }

    fn from_bean(injector: &mut dyn Injector, tag: &AutowireTag) -> Result<Self> {
        Lazy::<T>::autowire(injector, tag)
    }
}

impl Param for Context {
    fn from_bean(injector: &mut dyn Injector, _tag: &AutowireTag) -> Result<Self> {
        Ok(injector.context())
    }
}

/// Parameter bound from properties into any [`Bindable`] type, e.g. a config struct.
#[derive(Clone, Debug, PartialEq)]
pub struct Prop<T>(pub T);

impl<T> Prop<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Prop<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Bindable + 'static> Param for Prop<T> {
    fn from_property(injector: &mut dyn Injector, expr: &str) -> Result<Self> {
        injector.properties().bind_expr(expr).map(Prop)
    }
}

/// Trailing parameter receiving every extra positional arg and every `Option` arg whose
/// condition holds.
#[derive(Clone, Debug, PartialEq)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> std::ops::Deref for Variadic<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: Param> Param for Variadic<T> {
    const VARIADIC: bool = true;

    fn resolve(injector: &mut dyn Injector, args: &ArgList, _slot: usize) -> Result<Self> {
        let mut values = Vec::with_capacity(args.tail.len());
        for arg in &args.tail {
            match arg {
                Arg::Option(opt) => {
                    if let Some(value) = eval_option::<T>(injector, opt)? {
                        values.push(value);
                    }
                }
                other => values.push(T::from_arg(injector, other)?),
            }
        }
        Ok(Variadic(values))
    }
}
