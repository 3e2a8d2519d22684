use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A materialized literal value.
///
/// `Unsupported` stands in for any expression outside the literal grammar
/// (calls, names, operators...). It keeps the source text for diagnostics only.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    None,
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(IndexMap<Key, Value>),
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// A hashable dictionary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    String(String),
    Int(i64),
    /// Stored as raw bits so keys stay `Eq + Hash`.
    Float(u64),
    Bool(bool),
    None,
    Tuple(Vec<Key>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "str",
            Value::Number(Number::Int(_)) => "int",
            Value::Number(Number::Float(_)) => "float",
            Value::Bool(_) => "bool",
            Value::None => "NoneType",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Unsupported(_) => "unsupported",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<Key, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Find the first `Unsupported` node in this tree, returning the path
    /// suffix leading to it and its source text.
    pub fn find_unsupported(&self) -> Option<(String, &str)> {
        match self {
            Value::Unsupported(src) => Some((String::new(), src)),
            Value::List(items) | Value::Tuple(items) => {
                items.iter().enumerate().find_map(|(i, item)| {
                    item.find_unsupported()
                        .map(|(rest, src)| (format!(".{i}{rest}"), src))
                })
            }
            Value::Dict(map) => map.iter().find_map(|(k, v)| {
                v.find_unsupported()
                    .map(|(rest, src)| (format!(".{}{rest}", k.to_json_key()), src))
            }),
            _ => None,
        }
    }

    /// Python `repr()` of the value.
    pub fn repr(&self) -> String {
        let mut buf = String::new();
        write_repr(self, &mut buf);
        buf
    }
}

impl Key {
    /// Build a key from a value, or `None` if the value is unhashable.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Number(Number::Int(i)) => Some(Key::Int(*i)),
            Value::Number(Number::Float(f)) => Some(Key::Float(f.to_bits())),
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::None => Some(Key::None),
            Value::Tuple(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Tuple),
            Value::List(_) | Value::Dict(_) | Value::Unsupported(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::String(s) => Value::String(s.clone()),
            Key::Int(i) => Value::Number(Number::Int(*i)),
            Key::Float(bits) => Value::Number(Number::Float(f64::from_bits(*bits))),
            Key::Bool(b) => Value::Bool(*b),
            Key::None => Value::None,
            Key::Tuple(items) => Value::Tuple(items.iter().map(Key::to_value).collect()),
        }
    }

    /// The string a JSON encoder uses for this key (`json.dumps` conventions).
    pub fn to_json_key(&self) -> String {
        match self {
            Key::String(s) => s.clone(),
            Key::Int(i) => i.to_string(),
            Key::Float(bits) => format_float(f64::from_bits(*bits)),
            Key::Bool(true) => "true".into(),
            Key::Bool(false) => "false".into(),
            Key::None => "null".into(),
            Key::Tuple(_) => self.to_value().repr(),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

/// Python `str()` conventions: strings verbatim, everything else as `repr()`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".into()
    } else if x.is_infinite() {
        if x > 0.0 { "inf".into() } else { "-inf".into() }
    } else if x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn write_repr(value: &Value, buf: &mut String) {
    match value {
        Value::String(s) => write_str_repr(s, buf),
        Value::Number(n) => buf.push_str(&n.to_string()),
        Value::Bool(true) => buf.push_str("True"),
        Value::Bool(false) => buf.push_str("False"),
        Value::None => buf.push_str("None"),
        Value::List(items) => {
            buf.push('[');
            write_items(items, buf);
            buf.push(']');
        }
        Value::Tuple(items) => {
            buf.push('(');
            write_items(items, buf);
            if items.len() == 1 {
                buf.push(',');
            }
            buf.push(')');
        }
        Value::Dict(map) => {
            buf.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    buf.push_str(", ");
                }
                write_repr(&k.to_value(), buf);
                buf.push_str(": ");
                write_repr(v, buf);
            }
            buf.push('}');
        }
        Value::Unsupported(src) => buf.push_str(src),
    }
}

fn write_items(items: &[Value], buf: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        write_repr(item, buf);
    }
}

fn write_str_repr(s: &str, buf: &mut String) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    buf.push(quote);
    for c in s.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if c == quote => {
                buf.push('\\');
                buf.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                buf.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => buf.push(c),
        }
    }
    buf.push(quote);
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Value::Number(Number::Float(x)) => {
                if x.is_finite() {
                    serializer.serialize_f64(*x)
                } else {
                    serializer.serialize_unit()
                }
            }
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::None => serializer.serialize_unit(),
            Value::List(items) | Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    if let Key::Tuple(_) = k {
                        return Err(S::Error::custom(format!(
                            "keys must be str, int, float, bool or None, not tuple: {}",
                            k.to_value().repr()
                        )));
                    }
                    out.serialize_entry(&k.to_json_key(), v)?;
                }
                out.end()
            }
            Value::Unsupported(src) => Err(S::Error::custom(format!(
                "cannot serialize unsupported expression: {src}"
            ))),
        }
    }
}
