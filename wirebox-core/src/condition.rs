//! Conditions deciding whether a bean takes part in wiring.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, CoreError, Result};
use crate::expr::{Expr, ExprValue};
use crate::properties::Properties;
use crate::registry::Selector;

/// Result of evaluating a condition while beans are still being resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    Unmatched,
    /// Depends on beans whose own conditions are undecided; carries their ids.
    Pending(Vec<String>),
}

impl Outcome {
    fn from_bool(b: bool) -> Self {
        if b {
            Outcome::Matched
        } else {
            Outcome::Unmatched
        }
    }
}

/// Beans matching a selector, split by whether their condition is decided.
#[derive(Clone, Debug, Default)]
pub struct BeanLookup {
    pub resolved: Vec<String>,
    pub pending: Vec<String>,
}

/// What a condition may look at.
pub trait CondContext {
    fn properties(&self) -> &Properties;
    fn lookup(&self, selector: &Selector) -> BeanLookup;
}

pub type CondFn = Arc<dyn Fn(&Properties) -> Result<bool, BoxError> + Send + Sync>;

#[derive(Clone)]
pub enum Condition {
    OnProperty {
        key: String,
        having_value: Option<String>,
        match_if_missing: bool,
    },
    OnMissingProperty(String),
    OnBean(Selector),
    OnMissingBean(Selector),
    OnSingleBean(Selector),
    OnExpression(String),
    OnFunc(CondFn),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Ok,
}

impl Condition {
    pub fn on_property(key: impl Into<String>) -> Self {
        Condition::OnProperty {
            key: key.into(),
            having_value: None,
            match_if_missing: false,
        }
    }

    pub fn on_missing_property(key: impl Into<String>) -> Self {
        Condition::OnMissingProperty(key.into())
    }

    pub fn on_bean(selector: impl Into<Selector>) -> Self {
        Condition::OnBean(selector.into())
    }

    pub fn on_missing_bean(selector: impl Into<Selector>) -> Self {
        Condition::OnMissingBean(selector.into())
    }

    pub fn on_single_bean(selector: impl Into<Selector>) -> Self {
        Condition::OnSingleBean(selector.into())
    }

    pub fn on_expression(expr: impl Into<String>) -> Self {
        Condition::OnExpression(expr.into())
    }

    pub fn on_func<E, F>(f: F) -> Self
    where
        E: Into<BoxError>,
        F: Fn(&Properties) -> Result<bool, E> + Send + Sync + 'static,
    {
        Condition::OnFunc(Arc::new(move |p: &Properties| f(p).map_err(Into::into)))
    }

    /// For `OnProperty`: the value to compare against, or `expr:<predicate over $>`.
    pub fn having_value(mut self, value: impl Into<String>) -> Self {
        if let Condition::OnProperty { having_value, .. } = &mut self {
            *having_value = Some(value.into());
        }
        self
    }

    /// For `OnProperty`: match when the key is absent.
    pub fn match_if_missing(mut self) -> Self {
        if let Condition::OnProperty {
            match_if_missing, ..
        } = &mut self
        {
            *match_if_missing = true;
        }
        self
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut all) => {
                all.push(other);
                Condition::And(all)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut any) => {
                any.push(other);
                Condition::Or(any)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Evaluates left to right; `And`/`Or` stop at the first decisive or pending operand.
    pub fn evaluate(&self, ctx: &dyn CondContext) -> Result<Outcome> {
        let props = ctx.properties();
        match self {
            Condition::OnProperty {
                key,
                having_value,
                match_if_missing,
            } => {
                if !props.has(key) {
                    return Ok(Outcome::from_bool(*match_if_missing));
                }
                let Some(want) = having_value else {
                    return Ok(Outcome::Matched);
                };
                let value = match props.get(key) {
                    Some(raw) => props.resolve(raw)?,
                    None => String::new(),
                };
                match want.strip_prefix("expr:") {
                    Some(src) => {
                        let expr = Expr::parse(src)?;
                        let ok = expr.eval_bool(&|name| {
                            if name == "$" {
                                Ok(ExprValue::from_raw(&value))
                            } else {
                                props.expr_lookup(name)
                            }
                        })?;
                        Ok(Outcome::from_bool(ok))
                    }
                    None => Ok(Outcome::from_bool(value == *want)),
                }
            }
            Condition::OnMissingProperty(key) => Ok(Outcome::from_bool(!props.has(key))),
            Condition::OnBean(selector) => {
                let found = ctx.lookup(selector);
                Ok(if !found.resolved.is_empty() {
                    Outcome::Matched
                } else if !found.pending.is_empty() {
                    Outcome::Pending(found.pending)
                } else {
                    Outcome::Unmatched
                })
            }
            Condition::OnMissingBean(selector) => {
                let found = ctx.lookup(selector);
                Ok(if !found.resolved.is_empty() {
                    Outcome::Unmatched
                } else if !found.pending.is_empty() {
                    Outcome::Pending(found.pending)
                } else {
                    Outcome::Matched
                })
            }
            Condition::OnSingleBean(selector) => {
                let found = ctx.lookup(selector);
                Ok(if found.resolved.len() > 1 {
                    Outcome::Unmatched
                } else if !found.pending.is_empty() {
                    Outcome::Pending(found.pending)
                } else {
                    Outcome::from_bool(found.resolved.len() == 1)
                })
            }
            Condition::OnExpression(expr) => Ok(Outcome::from_bool(props.eval(expr)?)),
            Condition::OnFunc(f) => f(props)
                .map(Outcome::from_bool)
                .map_err(|e| CoreError::Unresolved(format!("condition function failed: {}", e))),
            Condition::And(all) => {
                for cond in all {
                    match cond.evaluate(ctx)? {
                        Outcome::Matched => {}
                        decided => return Ok(decided),
                    }
                }
                Ok(Outcome::Matched)
            }
            Condition::Or(any) => {
                for cond in any {
                    match cond.evaluate(ctx)? {
                        Outcome::Unmatched => {}
                        decided => return Ok(decided),
                    }
                }
                Ok(Outcome::Unmatched)
            }
            Condition::Not(inner) => Ok(match inner.evaluate(ctx)? {
                Outcome::Matched => Outcome::Unmatched,
                Outcome::Unmatched => Outcome::Matched,
                pending => pending,
            }),
            Condition::Ok => Ok(Outcome::Matched),
        }
    }

    /// Like [`Condition::evaluate`], but a pending outcome is an error.
    pub fn matches(&self, ctx: &dyn CondContext) -> Result<bool> {
        match self.evaluate(ctx)? {
            Outcome::Matched => Ok(true),
            Outcome::Unmatched => Ok(false),
            Outcome::Pending(ids) => Err(CoreError::Unresolved(format!(
                "condition depends on unresolved beans: {}",
                ids.join(", ")
            ))),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::OnProperty {
                key,
                having_value,
                match_if_missing,
            } => f
                .debug_struct("OnProperty")
                .field("key", key)
                .field("having_value", having_value)
                .field("match_if_missing", match_if_missing)
                .finish(),
            Condition::OnMissingProperty(key) => f.debug_tuple("OnMissingProperty").field(key).finish(),
            Condition::OnBean(s) => f.debug_tuple("OnBean").field(s).finish(),
            Condition::OnMissingBean(s) => f.debug_tuple("OnMissingBean").field(s).finish(),
            Condition::OnSingleBean(s) => f.debug_tuple("OnSingleBean").field(s).finish(),
            Condition::OnExpression(e) => f.debug_tuple("OnExpression").field(e).finish(),
            Condition::OnFunc(_) => f.write_str("OnFunc(..)"),
            Condition::And(all) => f.debug_tuple("And").field(all).finish(),
            Condition::Or(any) => f.debug_tuple("Or").field(any).finish(),
            Condition::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Condition::Ok => f.write_str("Ok"),
        }
    }
}

/// Condition context with no beans, for checks that only read properties.
pub struct PropertyContext<'a>(pub &'a Properties);

impl CondContext for PropertyContext<'_> {
    fn properties(&self) -> &Properties {
        self.0
    }

    fn lookup(&self, _selector: &Selector) -> BeanLookup {
        BeanLookup::default()
    }
}
