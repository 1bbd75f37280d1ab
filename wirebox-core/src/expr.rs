//! Boolean predicates for `expr` validators and `OnExpression`, evaluated with `evalexpr`.
//!
//! `$` names the value under validation; any other identifier (`server.port`, `hosts[0]`)
//! is a property key. Strings are double-quoted: `mode == "prod" && len($) > 3`.

use std::fmt;

use evalexpr::{ContextWithMutableVariables, EvalexprError, HashMapContext, Node, Value as EvalValue};

use crate::error::{CoreError, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum ExprValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl ExprValue {
    /// Reads a raw property string: numbers and booleans keep their type, the rest is text.
    pub fn from_raw(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(n) = s.parse::<i64>() {
            ExprValue::Int(n)
        } else if let Some(f) = s
            .parse::<f64>()
            .ok()
            .filter(|_| s.bytes().any(|b| b.is_ascii_digit()))
        {
            ExprValue::Float(f)
        } else if let Ok(b) = s.parse::<bool>() {
            ExprValue::Bool(b)
        } else {
            ExprValue::Str(raw.to_owned())
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Int(n) => write!(f, "{}", n),
            ExprValue::Float(n) => write!(f, "{}", n),
            ExprValue::Str(s) => f.write_str(s),
            ExprValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<ExprValue> for EvalValue {
    fn from(value: ExprValue) -> Self {
        match value {
            ExprValue::Int(n) => EvalValue::Int(n),
            ExprValue::Float(n) => EvalValue::Float(n),
            ExprValue::Str(s) => EvalValue::String(s),
            ExprValue::Bool(b) => EvalValue::Boolean(b),
        }
    }
}

/// A parsed expression, ready to evaluate against a variable lookup.
#[derive(Clone, Debug)]
pub struct Expr {
    src: String,
    node: Node,
}

impl Expr {
    pub fn parse(src: &str) -> Result<Self> {
        let node: Node = evalexpr::build_operator_tree(src).map_err(|e| CoreError::InvalidExpr {
            expr: src.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            src: src.to_owned(),
            node,
        })
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    /// Evaluates and requires a boolean result.
    ///
    /// Every identifier is looked up before evaluation. A missing property is reported as
    /// `PropertyNotExist` once the evaluation reads it.
    pub fn eval_bool(&self, lookup: &dyn Fn(&str) -> Result<ExprValue>) -> Result<bool> {
        let mut ctx: HashMapContext = HashMapContext::new();
        for name in self.node.iter_variable_identifiers() {
            let value = match lookup(name) {
                Ok(value) => value,
                Err(CoreError::PropertyNotExist(_)) => continue,
                Err(e) => return Err(e),
            };
            ctx.set_value(name.to_owned(), value.into())
                .map_err(|e| self.error(e))?;
        }
        self.node.eval_boolean_with_context(&ctx).map_err(|e| match e {
            EvalexprError::VariableIdentifierNotFound(name) => CoreError::PropertyNotExist(name),
            other => self.error(other),
        })
    }

    fn error(&self, reason: impl fmt::Display) -> CoreError {
        CoreError::InvalidExpr {
            expr: self.src.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, dollar: ExprValue) -> Result<bool> {
        Expr::parse(src)?.eval_bool(&|name| match name {
            "$" => Ok(dollar.clone()),
            "server.port" => Ok(ExprValue::from_raw("8080")),
            other => Err(CoreError::PropertyNotExist(other.into())),
        })
    }

    #[test]
    fn compares_numbers_and_strings() {
        assert!(eval("$ > 0 && $ < 10", ExprValue::Int(3)).unwrap());
        assert!(!eval("$ >= 10 || $ == 1", ExprValue::Int(3)).unwrap());
        assert!(eval(r#"$ == "abc""#, ExprValue::Str("abc".into())).unwrap());
        assert!(eval("server.port > 1024", ExprValue::Bool(true)).unwrap());
        assert!(eval("len($) == 3", ExprValue::Str("abc".into())).unwrap());
        assert!(eval("!($ % 2 == 1)", ExprValue::Int(4)).unwrap());
        assert!(eval("$ > 1", ExprValue::Float(1.5)).unwrap());
    }

    #[test]
    fn raw_values_keep_their_type() {
        assert_eq!(ExprValue::from_raw(" 42 "), ExprValue::Int(42));
        assert_eq!(ExprValue::from_raw("0.5"), ExprValue::Float(0.5));
        assert_eq!(ExprValue::from_raw("true"), ExprValue::Bool(true));
        assert_eq!(ExprValue::from_raw("nan"), ExprValue::Str("nan".into()));
        assert_eq!(ExprValue::from_raw("prod"), ExprValue::Str("prod".into()));
    }

    #[test]
    fn unknown_keys_fail_as_missing_properties() {
        let err = eval("missing.key > 1", ExprValue::Int(0)).unwrap_err();
        assert!(matches!(err, CoreError::PropertyNotExist(ref k) if k == "missing.key"), "{err:?}");
    }

    #[test]
    fn rejects_bad_syntax_and_non_boolean_results() {
        for bad in ["$ >", "($ > 1", "&& $"] {
            assert!(matches!(eval(bad, ExprValue::Int(1)), Err(CoreError::InvalidExpr { .. })), "{bad}");
        }
        assert!(matches!(eval("$ + 1", ExprValue::Int(1)), Err(CoreError::InvalidExpr { .. })));
    }
}
