//! Typed nested keyspace backing [`Properties`](crate::Properties).
//!
//! Every node is a value, a map or an array and keeps that variant for its whole life.
//! Writing past the end of an array extends it; the skipped positions stay absent.

use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::path::{join_path, split_path, PathSegment};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Value(String),
    Map(BTreeMap<String, Node>),
    /// Sparse by index so that holes can stay absent.
    Array(BTreeMap<usize, Node>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Value(_) => "value",
            Node::Map(_) => "map",
            Node::Array(_) => "array",
        }
    }

    fn accepts(&self, seg: &PathSegment) -> bool {
        matches!(
            (self, seg),
            (Node::Map(_), PathSegment::Key(_)) | (Node::Array(_), PathSegment::Index(_))
        )
    }

    fn child(&self, seg: &PathSegment) -> Option<&Node> {
        match (self, seg) {
            (Node::Map(m), PathSegment::Key(k)) => m.get(k),
            (Node::Array(a), PathSegment::Index(i)) => a.get(&parse_index(i)?),
            _ => None,
        }
    }

    /// Builds a fresh subtree holding `value` at `path`.
    fn build(path: &[PathSegment], value: &str) -> Node {
        match path.split_first() {
            None => Node::Value(value.to_owned()),
            Some((PathSegment::Key(k), rest)) => {
                Node::Map(BTreeMap::from([(k.clone(), Node::build(rest, value))]))
            }
            Some((PathSegment::Index(i), rest)) => {
                let idx = parse_index(i).unwrap_or_default();
                Node::Array(BTreeMap::from([(idx, Node::build(rest, value))]))
            }
        }
    }
}

fn parse_index(digits: &str) -> Option<usize> {
    digits.parse().ok()
}

/// Name used for the root node in conflict messages.
const ROOT_NAME: &str = "<root>";

fn conflict(path: &[PathSegment], node: &Node, key: &str) -> CoreError {
    CoreError::TypeConflict {
        path: match path {
            [] => ROOT_NAME.to_owned(),
            _ => join_path(path),
        },
        kind: node.kind(),
        key: key.to_owned(),
    }
}

/// Nested property tree addressed by Path-grammar keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    root: Option<Node>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`. A failed write leaves the storage unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = split_path(key)?;
        let bad_index = path
            .iter()
            .any(|s| s.is_index() && parse_index(s.as_str()).is_none());
        if path.is_empty() || bad_index {
            return Err(CoreError::InvalidKey(key.to_owned()));
        }
        match self.root.as_mut() {
            None => {
                self.root = Some(Node::build(&path, value));
                Ok(())
            }
            Some(root) => set_in(root, &path, 0, key, value),
        }
    }

    /// String of the value node at `key`; `None` for maps, arrays and missing keys.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.node(key)? {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True when any node exists at `key`.
    pub fn has(&self, key: &str) -> bool {
        self.node(key).is_some()
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        let path = split_path(key).ok()?;
        let mut node = self.root.as_ref()?;
        for seg in &path {
            node = node.child(seg)?;
        }
        Some(node)
    }

    /// Child names of a map (lexical) or indexes of an array (numeric). Missing keys have none.
    pub fn sub_keys(&self, key: &str) -> Result<Vec<String>> {
        split_path(key)?;
        match self.node(key) {
            None => Ok(Vec::new()),
            Some(Node::Map(m)) => Ok(m.keys().cloned().collect()),
            Some(Node::Array(a)) => Ok(a.keys().map(|i| i.to_string()).collect()),
            Some(node @ Node::Value(_)) => Err(CoreError::TypeConflict {
                path: key.to_owned(),
                kind: node.kind(),
                key: key.to_owned(),
            }),
        }
    }

    /// Every value key, lexically sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            let mut prefix = Vec::new();
            collect_keys(root, &mut prefix, &mut out);
        }
        out.sort();
        out
    }

    /// Independent deep snapshot.
    pub fn copy(&self) -> Storage {
        self.clone()
    }
}

fn set_in(node: &mut Node, path: &[PathSegment], depth: usize, key: &str, value: &str) -> Result<()> {
    let Some(seg) = path.get(depth) else {
        return match node {
            Node::Value(v) => {
                *v = value.to_owned();
                Ok(())
            }
            // An empty write only declares the container.
            _ if value.is_empty() => Ok(()),
            _ => Err(conflict(path, node, key)),
        };
    };
    if !node.accepts(seg) {
        return Err(conflict(&path[..depth], node, key));
    }
    let rest = &path[depth + 1..];
    match (node, seg) {
        (Node::Map(m), PathSegment::Key(k)) => match m.get_mut(k) {
            Some(child) => set_in(child, path, depth + 1, key, value),
            None => {
                m.insert(k.clone(), Node::build(rest, value));
                Ok(())
            }
        },
        (Node::Array(a), PathSegment::Index(i)) => {
            let idx = parse_index(i).ok_or_else(|| CoreError::InvalidKey(key.to_owned()))?;
            match a.get_mut(&idx) {
                Some(child) => set_in(child, path, depth + 1, key, value),
                None => {
                    a.insert(idx, Node::build(rest, value));
                    Ok(())
                }
            }
        }
        _ => unreachable!("accepts() checked the segment"),
    }
}

fn collect_keys(node: &Node, prefix: &mut Vec<PathSegment>, out: &mut Vec<String>) {
    match node {
        Node::Value(_) => out.push(join_path(prefix)),
        Node::Map(m) => {
            for (k, child) in m {
                prefix.push(PathSegment::Key(k.clone()));
                collect_keys(child, prefix, out);
                prefix.pop();
            }
        }
        Node::Array(a) => {
            for (i, child) in a {
                prefix.push(PathSegment::index(*i));
                collect_keys(child, prefix, out);
                prefix.pop();
            }
        }
    }
}
