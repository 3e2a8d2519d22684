use std::fmt;

use crate::error::Error;
use crate::value::{Key, Value};

/// A parsed query path: `.NAME.key.0.leaf`.
///
/// The first segment names a top-level assignment; the rest walk into its
/// value. No segments means the whole-file query `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPath {
    pub segments: Vec<String>,
}

impl QueryPath {
    /// Parse a query string like `.DATABASES.default.PORT`.
    ///
    /// Segments are split on `.` only, so keys may contain `-` or spaces but
    /// never a dot.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();

        if input == "." {
            return Ok(QueryPath { segments: vec![] });
        }

        let Some(rest) = input.strip_prefix('.') else {
            return Err(Error::InvalidQuery(format!(
                "path must start with '.', got: {input:?}"
            )));
        };

        let mut segments = Vec::new();
        let mut position = 1;
        for part in rest.split('.') {
            if part.is_empty() {
                return Err(Error::InvalidQuery(format!(
                    "empty key at position {position}"
                )));
            }
            position += part.len() + 1;
            segments.push(part.to_string());
        }

        Ok(QueryPath { segments })
    }

    pub fn is_whole_file(&self) -> bool {
        self.segments.is_empty()
    }

    /// The top-level assignment this path addresses.
    pub fn name(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Segments after the assignment name.
    pub fn keys(&self) -> &[String] {
        self.segments.get(1..).unwrap_or_default()
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str(".");
        }
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// Walk `keys` into `root`, which is the value bound to `name`.
pub fn walk<'v>(root: &'v Value, name: &str, keys: &[String]) -> Result<&'v Value, Error> {
    let mut current = root;
    let mut path = format!(".{name}");

    for key in keys {
        if let Value::Unsupported(src) = current {
            return Err(Error::UnsupportedLiteral {
                path,
                source_text: src.clone(),
            });
        }
        current = lookup(current, key).ok_or_else(|| Error::PathNotFound {
            segment: key.clone(),
            path: path.clone(),
        })?;
        path.push('.');
        path.push_str(key);
    }

    Ok(current)
}

/// One step of a path walk: dict key, or sequence index.
pub fn lookup<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Dict(map) => map.get(&Key::from(segment)).or_else(|| {
            segment
                .parse::<i64>()
                .ok()
                .and_then(|i| map.get(&Key::Int(i)))
        }),
        Value::List(items) | Value::Tuple(items) => {
            let index = segment.parse::<i64>().ok()?;
            let len = items.len() as i64;
            let index = if index < 0 { index + len } else { index };
            usize::try_from(index).ok().and_then(|i| items.get(i))
        }
        _ => None,
    }
}
