//! `PropertySource` and the in-memory and JSON sources.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use wirebox_core::Properties;

use crate::error::AppError;

/// Supplies flat `(key, value)` pairs in the property key grammar.
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    /// Pairs to write. `loaded` holds what earlier sources produced.
    fn load(&self, loaded: &Properties) -> Result<Vec<(String, String)>, AppError>;
}

/// Fixed pairs kept in memory.
#[derive(Clone, Debug, Default)]
pub struct MapSource {
    name: String,
    pairs: Vec<(String, String)>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
        }
    }

    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }
}

impl PropertySource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, _loaded: &Properties) -> Result<Vec<(String, String)>, AppError> {
        Ok(self.pairs.clone())
    }
}

/// A JSON document flattened into keys: objects give `a.b`, arrays `a[0]`, `null` an empty
/// value.
#[derive(Clone, Debug)]
pub struct JsonSource {
    name: String,
    value: Value,
}

impl JsonSource {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, AppError> {
        Ok(Self::new(name, serde_json::from_str(text)?))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(path.display().to_string(), &text)
    }

    /// Uses any serializable value, e.g. a defaults struct, as a source.
    pub fn from_serialize<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self, AppError> {
        Ok(Self::new(name, serde_json::to_value(value)?))
    }
}

impl PropertySource for JsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, _loaded: &Properties) -> Result<Vec<(String, String)>, AppError> {
        flatten_json(&self.value).map_err(|reason| AppError::source_error(&self.name, reason))
    }
}

/// Flattens `value` into `(key, value)` pairs. Empty objects and arrays produce nothing.
pub fn flatten_json(value: &Value) -> Result<Vec<(String, String)>, String> {
    match value {
        Value::Object(_) | Value::Array(_) => {
            let mut out = Vec::new();
            walk(String::new(), value, &mut out);
            Ok(out)
        }
        other => Err(format!("document root must be an object or an array, got {}", other)),
    }
}

fn walk(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                walk(path, child, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                walk(format!("{}[{}]", prefix, i), child, out);
            }
        }
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Null => out.push((prefix, String::new())),
        scalar => out.push((prefix, scalar.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_documents() {
        let doc = json!({
            "server": { "port": 8080, "tls": false },
            "hosts": ["a", { "name": "b" }],
            "note": null
        });
        let mut pairs = flatten_json(&doc).unwrap();
        pairs.sort();
        let expected: Vec<(String, String)> = [
            ("hosts[0]", "a"),
            ("hosts[1].name", "b"),
            ("note", ""),
            ("server.port", "8080"),
            ("server.tls", "false"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn root_array_and_scalar_root() {
        assert_eq!(
            flatten_json(&json!(["x"])).unwrap(),
            vec![("[0]".to_string(), "x".to_string())]
        );
        assert!(flatten_json(&json!(3)).is_err());
        assert!(flatten_json(&json!({})).unwrap().is_empty());
    }
}
