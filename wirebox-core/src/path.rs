//! Structured property keys: `a.b[0].c` split into key and index segments.

use std::fmt;

use crate::error::{CoreError, Result};

/// One segment of a property key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    /// Index kept as its digit string so that formatting reproduces the input.
    Index(String),
}

impl PathSegment {
    pub fn key(name: impl Into<String>) -> Self {
        PathSegment::Key(name.into())
    }

    pub fn index(n: usize) -> Self {
        PathSegment::Index(n.to_string())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PathSegment::Index(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PathSegment::Key(s) | PathSegment::Index(s) => s,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(s) => f.write_str(s),
            PathSegment::Index(s) => write!(f, "[{}]", s),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    InKey,
    AfterDot,
    InIndex,
    AfterIndex,
}

/// Splits `key` into segments. The empty string yields an empty path.
pub fn split_path(key: &str) -> Result<Vec<PathSegment>> {
    let invalid = || CoreError::InvalidKey(key.to_owned());
    let mut segments = Vec::new();
    let mut state = State::Start;
    let mut current = String::new();

    for c in key.chars() {
        state = match (state, c) {
            (State::InKey, '.') => {
                segments.push(PathSegment::Key(std::mem::take(&mut current)));
                State::AfterDot
            }
            (State::AfterIndex, '.') => State::AfterDot,
            (State::InKey, '[') => {
                segments.push(PathSegment::Key(std::mem::take(&mut current)));
                State::InIndex
            }
            (State::Start | State::AfterIndex, '[') => State::InIndex,
            (State::InIndex, ']') if !current.is_empty() => {
                segments.push(PathSegment::Index(std::mem::take(&mut current)));
                State::AfterIndex
            }
            (State::InIndex, d) if d.is_ascii_digit() => {
                current.push(d);
                State::InIndex
            }
            (State::Start | State::InKey | State::AfterDot, c) if !matches!(c, '.' | '[' | ']') => {
                current.push(c);
                State::InKey
            }
            _ => return Err(invalid()),
        };
    }

    match state {
        State::Start | State::AfterIndex => {}
        State::InKey => segments.push(PathSegment::Key(current)),
        State::AfterDot | State::InIndex => return Err(invalid()),
    }
    Ok(segments)
}

/// Formats segments back into a key; the inverse of [`split_path`].
pub fn join_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 && !seg.is_index() {
            out.push('.');
        }
        out.push_str(&seg.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_mixed_path() {
        let segs = split_path("a[0].b").unwrap();
        assert_eq!(
            segs,
            vec![
                PathSegment::key("a"),
                PathSegment::Index("0".into()),
                PathSegment::key("b")
            ]
        );
    }

    #[test]
    fn leading_and_repeated_indexes() {
        let segs = split_path("[0][12].x").unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(join_path(&segs), "[0][12].x");
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in [
            ".", "[", "]", "a.", "a.[0]", "a[]", "a[[0]]", "a[x]", "a]", "a..b", ".a", "a[0", "a[0]b",
        ] {
            let err = split_path(bad).unwrap_err();
            assert_eq!(err.to_string(), format!("invalid key '{}'", bad), "input {bad}");
        }
    }

    #[test]
    fn join_inverts_split() {
        for ok in ["", "a", "a.b.c", "a[0]", "a[0][1].b", "[3]", "[0].a", "a.b[007].c"] {
            assert_eq!(join_path(&split_path(ok).unwrap()), ok);
        }
    }
}
