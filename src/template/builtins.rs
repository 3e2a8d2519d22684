use crate::error::Error;
use crate::value::{Number, Value};

use super::eval::{as_int, fail};

/// Call a builtin function: `len`, `str`, `int`.
pub fn call_function(name: &str, args: &[Value]) -> Result<Value, Error> {
    match (name, args) {
        ("len", [arg]) => {
            let len = match arg {
                Value::String(s) => s.chars().count(),
                Value::List(items) | Value::Tuple(items) => items.len(),
                Value::Dict(map) => map.len(),
                other => {
                    return Err(fail(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Ok(int(i64::try_from(len).unwrap_or(i64::MAX)))
        }
        ("str", [arg]) => Ok(Value::String(arg.to_string())),
        ("int", [arg]) => match arg {
            Value::Number(Number::Int(n)) => Ok(int(*n)),
            Value::Number(Number::Float(x)) if x.is_finite() => Ok(int(x.trunc() as i64)),
            Value::Bool(b) => Ok(int(i64::from(*b))),
            Value::String(s) => s
                .trim()
                .replace('_', "")
                .parse::<i64>()
                .map(int)
                .map_err(|_| fail(format!("invalid literal for int(): {}", arg.repr()))),
            other => Err(fail(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
        ("len" | "str" | "int", _) => Err(fail(format!(
            "{name}() takes exactly one argument ({} given)",
            args.len()
        ))),
        _ => Err(fail(format!("unknown function: {name}"))),
    }
}

/// Call a string method on `target`.
pub fn call_method(target: &Value, name: &str, args: &[Value]) -> Result<Value, Error> {
    let Value::String(s) = target else {
        return Err(fail(format!(
            "'{}' object has no attribute '{name}'",
            target.type_name()
        )));
    };

    match name {
        "find" => find(s, args, false).map(int),
        "rfind" => find(s, args, true).map(int),
        "index" | "rindex" => match find(s, args, name == "rindex")? {
            -1 => Err(fail("substring not found")),
            i => Ok(int(i)),
        },
        "count" => {
            let [sub] = args else {
                return Err(arity(name, 1, args));
            };
            let sub = string_arg(sub, name)?;
            let n = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(sub).count()
            };
            Ok(int(i64::try_from(n).unwrap_or(i64::MAX)))
        }
        "upper" => no_args(name, args).map(|_| Value::String(s.to_uppercase())),
        "lower" => no_args(name, args).map(|_| Value::String(s.to_lowercase())),
        "strip" | "lstrip" | "rstrip" => strip(s, name, args),
        "replace" => replace(s, args),
        "split" | "rsplit" => split(s, name, args),
        "startswith" | "endswith" => {
            let [affix] = args else {
                return Err(arity(name, 1, args));
            };
            let candidates: Vec<&str> = match affix {
                Value::Tuple(items) => items
                    .iter()
                    .map(|v| string_arg(v, name))
                    .collect::<Result<_, _>>()?,
                other => vec![string_arg(other, name)?],
            };
            let hit = candidates.iter().any(|c| {
                if name == "startswith" {
                    s.starts_with(c)
                } else {
                    s.ends_with(c)
                }
            });
            Ok(Value::Bool(hit))
        }
        _ => Err(fail(format!("'str' object has no attribute '{name}'"))),
    }
}

fn int(n: i64) -> Value {
    Value::Number(Number::Int(n))
}

fn arity(name: &str, expected: usize, args: &[Value]) -> Error {
    fail(format!(
        "{name}() takes {expected} argument(s) ({} given)",
        args.len()
    ))
}

fn no_args(name: &str, args: &[Value]) -> Result<(), Error> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(arity(name, 0, args))
    }
}

fn string_arg<'a>(value: &'a Value, method: &str) -> Result<&'a str, Error> {
    value.as_str().ok_or_else(|| {
        fail(format!(
            "{method}() argument must be str, not '{}'",
            value.type_name()
        ))
    })
}

/// `find`/`rfind` with optional `start`/`end`; returns a char index or -1.
fn find(s: &str, args: &[Value], reverse: bool) -> Result<i64, Error> {
    let method = if reverse { "rfind" } else { "find" };
    let (sub, start, end) = match args {
        [sub] => (sub, None, None),
        [sub, start] => (sub, Some(as_int(start, method)?), None),
        [sub, start, end] => (sub, Some(as_int(start, method)?), Some(as_int(end, method)?)),
        _ => return Err(arity(method, 1, args)),
    };
    let sub = string_arg(sub, method)?;

    let chars: Vec<char> = s.chars().collect();
    let len = i64::try_from(chars.len()).unwrap_or(i64::MAX);
    let clamp = |bound: i64| if bound < 0 { (bound + len).max(0) } else { bound };
    let start = start.map_or(0, clamp);
    let end = end.map_or(len, clamp).min(len);
    if start > len || start > end {
        return Ok(-1);
    }
    // 0 <= start <= end <= len here.
    let (start, end) = (start as usize, end as usize);
    let haystack: String = chars[start..end].iter().collect();

    let found = if reverse {
        haystack.rfind(sub)
    } else {
        haystack.find(sub)
    };
    Ok(match found {
        Some(byte) => i64::try_from(start + haystack[..byte].chars().count()).unwrap_or(-1),
        None => -1,
    })
}

fn strip(s: &str, name: &str, args: &[Value]) -> Result<Value, Error> {
    let set: Option<Vec<char>> = match args {
        [] | [Value::None] => None,
        [chars] => Some(string_arg(chars, name)?.chars().collect()),
        _ => return Err(arity(name, 1, args)),
    };
    let matches = |c: char| match &set {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };
    let out = match name {
        "lstrip" => s.trim_start_matches(matches),
        "rstrip" => s.trim_end_matches(matches),
        _ => s.trim_matches(matches),
    };
    Ok(Value::String(out.to_string()))
}

fn replace(s: &str, args: &[Value]) -> Result<Value, Error> {
    let (old, new, count) = match args {
        [old, new] => (old, new, None),
        [old, new, count] => (old, new, Some(as_int(count, "replace")?)),
        _ => return Err(arity("replace", 2, args)),
    };
    let (old, new) = (string_arg(old, "replace")?, string_arg(new, "replace")?);
    let out = match count.and_then(|c| usize::try_from(c).ok()) {
        Some(c) => s.replacen(old, new, c),
        None => s.replace(old, new),
    };
    Ok(Value::String(out))
}

fn split(s: &str, name: &str, args: &[Value]) -> Result<Value, Error> {
    let (sep, max) = match args {
        [] => (None, None),
        [sep] => (Some(sep), None),
        [sep, max] => (Some(sep), Some(as_int(max, name)?)),
        _ => return Err(arity(name, 1, args)),
    };
    let sep = match sep {
        None | Some(Value::None) => None,
        Some(v) => Some(string_arg(v, name)?),
    };
    if sep == Some("") {
        return Err(fail("empty separator"));
    }
    let max = max.and_then(|m| usize::try_from(m).ok());
    let reverse = name == "rsplit";

    let parts: Vec<String> = match (sep, max) {
        (Some(sep), Some(max)) if reverse => {
            let mut parts: Vec<String> = s.rsplitn(max + 1, sep).map(String::from).collect();
            parts.reverse();
            parts
        }
        (Some(sep), Some(max)) => s.splitn(max + 1, sep).map(String::from).collect(),
        (Some(sep), None) => s.split(sep).map(String::from).collect(),
        (None, Some(max)) => split_whitespace_max(s, max, reverse),
        (None, None) => s.split_whitespace().map(String::from).collect(),
    };
    Ok(Value::List(parts.into_iter().map(Value::String).collect()))
}

fn split_whitespace_max(s: &str, max: usize, reverse: bool) -> Vec<String> {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= max + 1 {
        return words.into_iter().map(String::from).collect();
    }
    if reverse {
        // Keep the head intact, split the last `max` words off.
        let mut rest = s.trim_end();
        let mut tail = Vec::new();
        for _ in 0..max {
            let cut = rest.rfind(char::is_whitespace).unwrap_or(0);
            tail.push(rest[cut..].trim_start().to_string());
            rest = rest[..cut].trim_end();
        }
        tail.push(rest.trim_start().to_string());
        tail.reverse();
        tail
    } else {
        let mut rest = s.trim_start();
        let mut head = Vec::new();
        for _ in 0..max {
            let cut = rest.find(char::is_whitespace).unwrap_or(rest.len());
            head.push(rest[..cut].to_string());
            rest = rest[cut..].trim_start();
        }
        head.push(rest.to_string());
        head
    }
}
