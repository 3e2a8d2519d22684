use indexmap::IndexMap;

use crate::error::Error;
use crate::value::{Key, Number, Value};

use super::ast::{BinOp, Expr};
use super::builtins;

/// Variables visible to a suffix expression: the resolved mapping.
pub type Scope = IndexMap<Key, Value>;

pub fn eval(expr: &Expr, scope: &Scope) -> Result<Value, Error> {
    match expr {
        Expr::Name(name) => {
            let value = scope
                .get(&Key::from(name.as_str()))
                .ok_or_else(|| fail(format!("name '{name}' is not defined")))?;
            if let Some((rest, src)) = value.find_unsupported() {
                return Err(Error::UnsupportedLiteral {
                    path: format!(".{name}{rest}"),
                    source_text: src.to_string(),
                });
            }
            Ok(value.clone())
        }
        Expr::Int(n) => Ok(Value::Number(Number::Int(*n))),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Neg(inner) => match eval(inner, scope)? {
            Value::Number(Number::Int(n)) => n
                .checked_neg()
                .map(|n| Value::Number(Number::Int(n)))
                .ok_or_else(|| fail("integer overflow")),
            Value::Number(Number::Float(x)) => Ok(Value::Number(Number::Float(-x))),
            other => Err(fail(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
        Expr::BinOp(op, left, right) => binop(*op, eval(left, scope)?, eval(right, scope)?),
        Expr::Index(target, index) => {
            let target = eval(target, scope)?;
            let index = eval(index, scope)?;
            subscript(&target, &index)
        }
        Expr::Slice {
            target,
            start,
            stop,
            step,
        } => {
            let target = eval(target, scope)?;
            let start = eval_bound(start.as_deref(), scope)?;
            let stop = eval_bound(stop.as_deref(), scope)?;
            let step = eval_bound(step.as_deref(), scope)?;
            slice(&target, start, stop, step)
        }
        Expr::Method { target, name, args } => {
            let target = eval(target, scope)?;
            let args = args
                .iter()
                .map(|a| eval(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            builtins::call_method(&target, name, &args)
        }
        Expr::Call { name, args } => {
            let args = args
                .iter()
                .map(|a| eval(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            builtins::call_function(name, &args)
        }
    }
}

pub(crate) fn fail(message: impl Into<String>) -> Error {
    Error::TemplateEval(message.into())
}

pub(crate) fn as_int(value: &Value, what: &str) -> Result<i64, Error> {
    match value {
        Value::Number(Number::Int(n)) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(fail(format!(
            "{what} must be an integer, not '{}'",
            other.type_name()
        ))),
    }
}

fn eval_bound(expr: Option<&Expr>, scope: &Scope) -> Result<Option<i64>, Error> {
    match expr {
        None => Ok(None),
        Some(e) => match eval(e, scope)? {
            Value::None => Ok(None),
            v => as_int(&v, "slice indices").map(Some),
        },
    }
}

fn binop(op: BinOp, left: Value, right: Value) -> Result<Value, Error> {
    use Value::{List, Number as Num, String as Str, Tuple};

    let overflow = || fail("integer overflow");
    let unsupported = |l: &Value, r: &Value| {
        let symbol = match op {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
        };
        fail(format!(
            "unsupported operand type(s) for {symbol}: '{}' and '{}'",
            l.type_name(),
            r.type_name()
        ))
    };

    match (op, &left, &right) {
        (_, Num(Number::Int(a)), Num(Number::Int(b))) => {
            let (a, b) = (*a, *b);
            let n = match op {
                BinOp::Add => a.checked_add(b).ok_or_else(overflow)?,
                BinOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
                BinOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
                BinOp::FloorDiv => floor_div(a, b)?,
                BinOp::Mod => floor_mod(a, b)?,
            };
            Ok(Num(Number::Int(n)))
        }
        (BinOp::Add | BinOp::Sub | BinOp::Mul, Num(a), Num(b)) => {
            let (a, b) = (to_f64(*a), to_f64(*b));
            let x = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                _ => a * b,
            };
            Ok(Num(Number::Float(x)))
        }
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(format!("{a}{b}"))),
        (BinOp::Add, List(a), List(b)) => Ok(List(a.iter().chain(b).cloned().collect())),
        (BinOp::Add, Tuple(a), Tuple(b)) => Ok(Tuple(a.iter().chain(b).cloned().collect())),
        (BinOp::Mul, Str(s), Num(Number::Int(n))) | (BinOp::Mul, Num(Number::Int(n)), Str(s)) => {
            let times = repeat_count(s.len(), *n)?;
            Ok(Str(s.repeat(times)))
        }
        (BinOp::Mul, List(items), Num(Number::Int(n)))
        | (BinOp::Mul, Num(Number::Int(n)), List(items)) => {
            let times = repeat_count(items.len(), *n)?;
            Ok(List(items.iter().cloned().cycle().take(items.len() * times).collect()))
        }
        _ => Err(unsupported(&left, &right)),
    }
}

/// Upper bound on the length of a repeated string or list.
const MAX_REPEAT_LEN: usize = 1 << 20;

/// Validated repetition count for `len`-long sequences; negative counts
/// repeat zero times.
fn repeat_count(len: usize, n: i64) -> Result<usize, Error> {
    let times = usize::try_from(n).unwrap_or(0);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(fail("repeated sequence too long")),
    }
}

fn to_f64(n: Number) -> f64 {
    match n {
        Number::Int(i) => i as f64,
        Number::Float(x) => x,
    }
}

fn floor_div(a: i64, b: i64) -> Result<i64, Error> {
    if b == 0 {
        return Err(fail("integer division or modulo by zero"));
    }
    let q = a.checked_div(b).ok_or_else(|| fail("integer overflow"))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, Error> {
    if b == 0 {
        return Err(fail("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).ok_or_else(|| fail("integer overflow"))?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn subscript(target: &Value, index: &Value) -> Result<Value, Error> {
    match target {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = resolve_index(as_int(index, "string indices")?, chars.len())
                .ok_or_else(|| fail("string index out of range"))?;
            Ok(Value::String(chars[i].to_string()))
        }
        Value::List(items) | Value::Tuple(items) => {
            let i = resolve_index(as_int(index, "sequence indices")?, items.len())
                .ok_or_else(|| fail(format!("{} index out of range", target.type_name())))?;
            Ok(items[i].clone())
        }
        Value::Dict(map) => {
            let key = Key::from_value(index)
                .ok_or_else(|| fail(format!("unhashable type: '{}'", index.type_name())))?;
            map.get(&key)
                .cloned()
                .ok_or_else(|| fail(format!("key not found: {}", index.repr())))
        }
        other => Err(fail(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

/// Positions selected by `[start:stop:step]` over a sequence of `len` items,
/// with Python's clamping rules.
fn slice_positions(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, Error> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(fail("slice step cannot be zero"));
    }
    let len = i64::try_from(len).map_err(|_| fail("sequence too long"))?;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: i64| {
        if bound < 0 {
            (bound + len).max(lower)
        } else {
            bound.min(upper)
        }
    };
    let start = start.map_or(if step > 0 { lower } else { upper }, clamp);
    let stop = stop.map_or(if step > 0 { upper } else { lower }, clamp);

    let mut positions = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        // i stays within [0, len) by construction of the bounds above.
        positions.push(i as usize);
        i += step;
    }
    Ok(positions)
}

fn slice(
    target: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value, Error> {
    match target {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let positions = slice_positions(chars.len(), start, stop, step)?;
            Ok(Value::String(positions.into_iter().map(|i| chars[i]).collect()))
        }
        Value::List(items) => {
            let positions = slice_positions(items.len(), start, stop, step)?;
            Ok(Value::List(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let positions = slice_positions(items.len(), start, stop, step)?;
            Ok(Value::Tuple(positions.into_iter().map(|i| items[i].clone()).collect()))
        }
        other => Err(fail(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}
