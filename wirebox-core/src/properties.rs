//! Properties: storage facade with `${key:=default}` resolution and typed binding.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::expr::{Expr, ExprValue};
use crate::path::split_path;
use crate::storage::{Node, Storage};

/// Where a bind reads from: a key (relative parts already joined), an optional default and
/// an optional `expr` validator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BindParam {
    pub key: String,
    pub default: Option<String>,
    pub validate: Option<String>,
    /// Human readable target used in error messages, e.g. `ServerConfig.port`.
    pub path: String,
}

impl BindParam {
    /// Parses a `${key[:=default]}` tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let (key, default) = parse_tag(tag)?;
        Ok(Self {
            key,
            default,
            validate: None,
            path: String::new(),
        })
    }

    /// Param for a nested field: the field's key is relative to this one, `${}` splats.
    pub fn field(&self, name: &str, tag: &str) -> Result<Self> {
        let (sub, default) = parse_tag(tag)?;
        let path = if self.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", self.path, name)
        };
        Ok(Self {
            key: join_key(&self.key, &sub),
            default,
            validate: None,
            path,
        })
    }

    pub fn with_validate(mut self, expr: Option<&str>) -> Self {
        self.validate = expr.map(str::to_owned);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    fn element(&self, sub: &str, default: Option<String>) -> Self {
        Self {
            key: join_key(&self.key, sub),
            default,
            validate: None,
            path: join_key(&self.target(), sub),
        }
    }

    pub fn target(&self) -> String {
        if self.path.is_empty() {
            self.key.clone()
        } else {
            self.path.clone()
        }
    }
}

fn join_key(parent: &str, sub: &str) -> String {
    match (parent.is_empty(), sub.is_empty()) {
        (true, _) => sub.to_owned(),
        (_, true) => parent.to_owned(),
        _ if sub.starts_with('[') => format!("{}{}", parent, sub),
        _ => format!("{}.{}", parent, sub),
    }
}

fn parse_tag(tag: &str) -> Result<(String, Option<String>)> {
    let body = tag
        .trim()
        .strip_prefix("${")
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| CoreError::InvalidPlaceholder(tag.to_owned()))?;
    let (key, default) = split_default(body);
    Ok((key.trim().to_owned(), default.map(str::to_owned)))
}

/// Splits a placeholder body on the first top-level `:=`.
fn split_default(body: &str) -> (&str, Option<&str>) {
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 1;
            }
            b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b'=') => {
                return (&body[..i], Some(&body[i + 2..]));
            }
            _ => {}
        }
        i += 1;
    }
    (body, None)
}

/// Byte offset of the `}` closing the placeholder whose body starts at `from`.
fn closing_brace(s: &str, from: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Property store: typed reads, placeholder resolution and binding into Rust values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
    storage: Storage,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut props = Self::new();
        for (k, v) in pairs {
            props.set(k.as_ref(), v.as_ref())?;
        }
        Ok(props)
    }

    pub fn set(&mut self, key: &str, value: impl AsRef<str>) -> Result<()> {
        self.storage.set(key, value.as_ref())
    }

    /// Raw (unresolved) string at `key`; `None` unless the node is a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.storage.get(key)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_owned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.storage.has(key)
    }

    pub fn sub_keys(&self, key: &str) -> Result<Vec<String>> {
        self.storage.sub_keys(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.storage.keys()
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.storage.node(key)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn copy(&self) -> Properties {
        self.clone()
    }

    /// Expands every `${key[:=default]}` in `s`.
    pub fn resolve(&self, s: &str) -> Result<String> {
        let mut chain = Vec::new();
        self.resolve_with(s, &mut chain)
    }

    fn resolve_with(&self, s: &str, chain: &mut Vec<String>) -> Result<String> {
        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let end = closing_brace(rest, start + 2)
                .ok_or_else(|| CoreError::InvalidPlaceholder(s.to_owned()))?;
            let body = &rest[start + 2..end];
            out.push_str(&self.resolve_placeholder(body, s, chain)?);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve_placeholder(&self, body: &str, whole: &str, chain: &mut Vec<String>) -> Result<String> {
        let (key, default) = split_default(body);
        let key = key.trim();
        if key.is_empty() {
            return Err(CoreError::InvalidPlaceholder(whole.to_owned()));
        }
        split_path(key)?;
        if chain.iter().any(|k| k == key) {
            let mut cycle = chain.clone();
            cycle.push(key.to_owned());
            return Err(CoreError::CircularReference(cycle.join(" -> ")));
        }
        match self.storage.node(key) {
            Some(Node::Value(v)) => {
                chain.push(key.to_owned());
                let resolved = self.resolve_with(v, chain);
                chain.pop();
                resolved
            }
            Some(node) => Err(CoreError::bind(key, format!("a {} can't be used as a string", node.kind()))),
            None => match default {
                Some(d) => self.resolve_with(d, chain),
                None => Err(CoreError::PropertyNotExist(key.to_owned())),
            },
        }
    }

    /// Resolved string for `param`: the value node, else the default, else `None`.
    pub fn raw_value(&self, param: &BindParam) -> Result<Option<String>> {
        match self.storage.node(&param.key) {
            Some(Node::Value(v)) => self.resolve(v).map(Some),
            Some(node) => Err(CoreError::bind(
                param.target(),
                format!("property '{}' is a {}", param.key, node.kind()),
            )),
            None => param.default.as_deref().map(|d| self.resolve(d)).transpose(),
        }
    }

    /// Binds the value selected by a `${key[:=default]}` tag.
    pub fn bind<T: Bindable>(&self, tag: &str) -> Result<T> {
        self.bind_param(&BindParam::from_tag(tag)?)
    }

    /// Binds and then runs the param's `expr` validator, if any.
    pub fn bind_param<T: Bindable>(&self, param: &BindParam) -> Result<T> {
        let value = T::bind(self, param)?;
        if let Some(src) = &param.validate {
            let expr = Expr::parse(src)?;
            let dollar = value
                .expr_value()
                .ok_or_else(|| CoreError::bind(param.target(), "only scalar values can be validated"))?;
            let ok = expr.eval_bool(&|name| {
                if name == "$" {
                    Ok(dollar.clone())
                } else {
                    self.expr_lookup(name)
                }
            })?;
            if !ok {
                return Err(CoreError::Validation {
                    expr: src.clone(),
                    value: dollar.to_string(),
                });
            }
        }
        Ok(value)
    }

    /// Binds field `name` of the struct bound at `parent`.
    pub fn bind_field<T: Bindable>(
        &self,
        parent: &BindParam,
        name: &str,
        tag: &str,
        validate: Option<&str>,
    ) -> Result<T> {
        let param = parent.field(name, tag)?.with_validate(validate);
        self.bind_param(&param)
    }

    /// Binds an argument expression.
    ///
    /// A lone `${key[:=default]}` (or `$key`) binds that key; any other string is resolved
    /// first and the result is bound as a plain value.
    pub fn bind_expr<T: Bindable>(&self, expr: &str) -> Result<T> {
        let s = expr.trim();
        if s.starts_with("${") && closing_brace(s, 2) == Some(s.len() - 1) {
            return self.bind(s);
        }
        if let Some(key) = s.strip_prefix('$').filter(|k| !k.starts_with('{')) {
            return self.bind(&format!("${{{}}}", key));
        }
        let literal = BindParam {
            key: "value".to_owned(),
            default: Some(self.resolve(s)?),
            validate: None,
            path: s.to_owned(),
        };
        Properties::new().bind_param(&literal)
    }

    /// Identifier lookup used by `OnExpression`: property keys evaluate to their resolved
    /// value, typed by [`ExprValue::from_raw`].
    pub fn expr_lookup(&self, name: &str) -> Result<ExprValue> {
        let raw = self
            .get(name)
            .ok_or_else(|| CoreError::PropertyNotExist(name.to_owned()))?;
        Ok(ExprValue::from_raw(&self.resolve(raw)?))
    }

    /// Evaluates a boolean expression over the keyspace.
    pub fn eval(&self, expr: &str) -> Result<bool> {
        Expr::parse(expr)?.eval_bool(&|name| self.expr_lookup(name))
    }
}

/// A type that can be built from the keyspace.
///
/// Implemented for scalars, `String`, `Duration`, `Option`, `Vec` and string-keyed maps;
/// `#[derive(Bindable)]` implements it for structs whose fields carry `#[value]` tags.
pub trait Bindable: Sized {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self>;

    /// Value seen as `$` by `expr` validators; `None` for composites.
    fn expr_value(&self) -> Option<ExprValue> {
        None
    }
}

fn required(props: &Properties, param: &BindParam) -> Result<String> {
    props
        .raw_value(param)?
        .ok_or_else(|| CoreError::PropertyNotExist(param.key.clone()))
}

macro_rules! bind_from_str {
    ($($t:ty => $expr:expr),* $(,)?) => {
        $(
            impl Bindable for $t {
                fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
                    let raw = required(props, param)?;
                    raw.trim()
                        .parse::<$t>()
                        .map_err(|e| CoreError::bind(param.target(), format!("can't parse {:?}: {}", raw, e)))
                }

                fn expr_value(&self) -> Option<ExprValue> {
                    let f: fn(&$t) -> ExprValue = $expr;
                    Some(f(self))
                }
            }
        )*
    };
}

bind_from_str! {
    bool => |b| ExprValue::Bool(*b),
    i8 => |n| ExprValue::Int(i64::from(*n)),
    i16 => |n| ExprValue::Int(i64::from(*n)),
    i32 => |n| ExprValue::Int(i64::from(*n)),
    i64 => |n| ExprValue::Int(*n),
    isize => |n| ExprValue::Int(*n as i64),
    u8 => |n| ExprValue::Int(i64::from(*n)),
    u16 => |n| ExprValue::Int(i64::from(*n)),
    u32 => |n| ExprValue::Int(i64::from(*n)),
    u64 => |n| i64::try_from(*n).map_or(ExprValue::Float(*n as f64), ExprValue::Int),
    usize => |n| i64::try_from(*n).map_or(ExprValue::Float(*n as f64), ExprValue::Int),
    f32 => |n| ExprValue::Float(f64::from(*n)),
    f64 => |n| ExprValue::Float(*n),
}

impl Bindable for String {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        required(props, param)
    }

    fn expr_value(&self) -> Option<ExprValue> {
        Some(ExprValue::Str(self.clone()))
    }
}

impl Bindable for Duration {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        let raw = required(props, param)?;
        humantime::parse_duration(raw.trim())
            .map_err(|e| CoreError::bind(param.target(), format!("can't parse duration {:?}: {}", raw, e)))
    }

    fn expr_value(&self) -> Option<ExprValue> {
        Some(match self.subsec_nanos() {
            0 => i64::try_from(self.as_secs()).map_or(ExprValue::Float(self.as_secs_f64()), ExprValue::Int),
            _ => ExprValue::Float(self.as_secs_f64()),
        })
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        if !props.has(&param.key) && param.default.is_none() {
            return Ok(None);
        }
        T::bind(props, param).map(Some)
    }

    fn expr_value(&self) -> Option<ExprValue> {
        self.as_ref().and_then(T::expr_value)
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        match props.node(&param.key) {
            Some(Node::Array(items)) => items
                .keys()
                .map(|i| props.bind_param(&param.element(&format!("[{}]", i), None)))
                .collect(),
            Some(Node::Map(_)) => Err(CoreError::bind(
                param.target(),
                format!("property '{}' is a map", param.key),
            )),
            _ => {
                let raw = required(props, param)?;
                split_list(&raw)
                    .enumerate()
                    .map(|(i, item)| {
                        props.bind_param(&param.element(&format!("[{}]", i), Some(item.to_owned())))
                    })
                    .collect()
            }
        }
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    let raw = raw.trim();
    raw.split(',')
        .map(str::trim)
        .filter(move |_| !raw.is_empty())
}

fn bind_entries<T: Bindable>(props: &Properties, param: &BindParam) -> Result<Vec<(String, T)>> {
    match props.node(&param.key) {
        Some(Node::Map(entries)) => entries
            .keys()
            .map(|k| Ok((k.clone(), props.bind_param(&param.element(k, None))?)))
            .collect(),
        Some(node) => Err(CoreError::bind(
            param.target(),
            format!("property '{}' is a {}", param.key, node.kind()),
        )),
        None => match param.default.as_deref() {
            Some(d) if d.trim().is_empty() => Ok(Vec::new()),
            Some(d) => Err(CoreError::bind(
                param.target(),
                format!("map default must be empty, got {:?}", d),
            )),
            None => Err(CoreError::PropertyNotExist(param.key.clone())),
        },
    }
}

impl<T: Bindable> Bindable for HashMap<String, T> {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        Ok(bind_entries(props, param)?.into_iter().collect())
    }
}

impl<T: Bindable> Bindable for BTreeMap<String, T> {
    fn bind(props: &Properties, param: &BindParam) -> Result<Self> {
        Ok(bind_entries(props, param)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_default_respects_nesting() {
        assert_eq!(split_default("a:=${b:=x}"), ("a", Some("${b:=x}")));
        assert_eq!(split_default("a"), ("a", None));
        assert_eq!(split_default("a:="), ("a", Some("")));
    }

    #[test]
    fn field_keys_are_relative() {
        let root = BindParam::from_tag("${db}").unwrap();
        assert_eq!(root.field("host", "${host}").unwrap().key, "db.host");
        assert_eq!(root.field("all", "${}").unwrap().key, "db");
        assert_eq!(root.field("first", "${[0]}").unwrap().key, "db[0]");
        let splat = BindParam::from_tag("${}").unwrap();
        assert_eq!(splat.field("port", "${port:=80}").unwrap().default.as_deref(), Some("80"));
    }

    #[test]
    fn tag_must_be_a_placeholder() {
        assert!(matches!(
            BindParam::from_tag("port"),
            Err(CoreError::InvalidPlaceholder(_))
        ));
    }
}
