use indexmap::IndexMap;

use crate::parser::ast::Expr;
use crate::value::{Key, Number, Value};

/// Convert a literal expression into a [`Value`].
///
/// Never fails: anything outside the literal grammar becomes
/// [`Value::Unsupported`], and only surfaces as an error when a query lands on it.
pub fn materialize(expr: &Expr) -> Value {
    match expr {
        Expr::Str(s) => Value::String(s.clone()),
        Expr::Number { text, negative } => number(text, *negative),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::None => Value::None,
        Expr::List(items) => Value::List(items.iter().map(materialize).collect()),
        Expr::Tuple(items) => Value::Tuple(items.iter().map(materialize).collect()),
        Expr::Dict(entries) => dict(entries),
        Expr::Other(text) => Value::Unsupported(text.clone()),
    }
}

fn dict(entries: &[(Expr, Expr)]) -> Value {
    let mut map = IndexMap::with_capacity(entries.len());
    for (k, v) in entries {
        let key_value = materialize(k);
        let Some(key) = Key::from_value(&key_value) else {
            return Value::Unsupported(format!("dict with unhashable key {}", key_value.repr()));
        };
        // Re-inserting keeps the first position and takes the last value.
        map.insert(key, materialize(v));
    }
    Value::Dict(map)
}

fn number(text: &str, negative: bool) -> Value {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();

    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };

    if let Some(radix) = radix {
        return match i128::from_str_radix(&lower[2..], radix) {
            Ok(n) => int(if negative { -n } else { n }),
            Err(_) => Value::Unsupported(signed_text(text, negative)),
        };
    }

    if lower.contains(['.', 'e']) {
        return match lower.parse::<f64>() {
            Ok(x) => Value::Number(Number::Float(if negative { -x } else { x })),
            Err(_) => Value::Unsupported(signed_text(text, negative)),
        };
    }

    match lower.parse::<i128>() {
        Ok(n) => int(if negative { -n } else { n }),
        Err(_) => match lower.parse::<f64>() {
            Ok(x) => Value::Number(Number::Float(if negative { -x } else { x })),
            Err(_) => Value::Unsupported(signed_text(text, negative)),
        },
    }
}

/// Integers beyond 64 bits degrade to floats.
fn int(n: i128) -> Value {
    match i64::try_from(n) {
        Ok(i) => Value::Number(Number::Int(i)),
        Err(_) => Value::Number(Number::Float(n as f64)),
    }
}

fn signed_text(text: &str, negative: bool) -> String {
    if negative {
        format!("-{text}")
    } else {
        text.to_string()
    }
}
