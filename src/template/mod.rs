//! `{KEY<suffix>}` templates over a resolved mapping.
//!
//! A placeholder names a key of the mapping and may carry a suffix such as
//! `[1:]` or `.upper()`. The suffix is evaluated by a small sandboxed
//! interpreter (`lexer` → `parser` → `eval`) with the mapping's string keys
//! bound as variables.

pub mod ast;
pub mod builtins;
pub mod eval;
pub mod lexer;
pub mod parser;

use log::debug;

use crate::error::Error;
use crate::value::{Key, Value};

use self::eval::Scope;
use self::lexer::Lexer;
use self::parser::Parser;

/// Evaluate a suffix expression such as `ENGINE[ENGINE.rfind(".")+1:]`.
pub fn evaluate(src: &str, scope: &Scope) -> Result<Value, Error> {
    let mut lexer = Lexer::new(src);
    lexer.tokenize()?;
    let expr = Parser::new(lexer.tokens).parse()?;
    eval::eval(&expr, scope)
}

/// Substitute every placeholder of `template` with values from `value`,
/// which must be a dict.
pub fn render(template: &str, value: &Value, eval: bool) -> Result<String, Error> {
    let Some(scope) = value.as_dict() else {
        return Err(Error::TemplateEval(format!(
            "a format string needs a dict, got {}",
            value.type_name()
        )));
    };

    let mut out = String::with_capacity(template.len());
    for piece in pieces(template)? {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Field { key, suffix } => {
                let entry = scope
                    .get(&Key::from(key))
                    .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
                if let Some((rest, src)) = entry.find_unsupported() {
                    return Err(Error::UnsupportedLiteral {
                        path: format!(".{key}{rest}"),
                        source_text: src.to_string(),
                    });
                }
                if suffix.is_empty() {
                    out.push_str(&entry.to_string());
                } else if eval {
                    let computed = evaluate(&format!("{key}{suffix}"), scope)?;
                    out.push_str(&computed.to_string());
                } else {
                    debug!("dropping suffix {suffix:?} of placeholder {key:?}");
                    out.push_str(&entry.to_string());
                }
            }
        }
    }
    Ok(out)
}

#[derive(Debug, PartialEq)]
enum Piece<'a> {
    Text(&'a str),
    Field { key: &'a str, suffix: &'a str },
}

fn pieces(template: &str) -> Result<Vec<Piece<'_>>, Error> {
    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                pieces.push(Piece::Text(&template[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                pieces.push(Piece::Text(&template[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'}' => {
                return Err(Error::TemplateEval(format!(
                    "single '}}' encountered in format string (at position {i})"
                )))
            }
            b'{' => {
                if text_start < i {
                    pieces.push(Piece::Text(&template[text_start..i]));
                }
                let end = closing_brace(bytes, i)?;
                pieces.push(field(&template[i + 1..end])?);
                i = end + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    if text_start < template.len() {
        pieces.push(Piece::Text(&template[text_start..]));
    }
    Ok(pieces)
}

/// Index of the `}` closing the placeholder opened at `open`.
fn closing_brace(bytes: &[u8], open: usize) -> Result<usize, Error> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth == 0 => return Ok(i),
                b'}' => depth -= 1,
                _ => {}
            },
        }
        i += 1;
    }
    Err(Error::TemplateEval(format!(
        "expected '}}' before end of string (placeholder at position {open})"
    )))
}

fn field(inner: &str) -> Result<Piece<'_>, Error> {
    let split = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(inner.len());
    let (key, suffix) = inner.split_at(split);
    if key.is_empty() {
        return Err(Error::TemplateEval(format!(
            "placeholder {{{inner}}} does not start with a key"
        )));
    }
    Ok(Piece::Field { key, suffix })
}
