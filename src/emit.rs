//! Write a literal back into settings source.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use log::info;

use crate::error::Error;
use crate::index::AssignmentIndex;
use crate::input::normalize_newlines;
use crate::materialize::materialize;
use crate::parser;
use crate::query::path::QueryPath;
use crate::value::Value;

/// How new literal content is combined with the existing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Replace the existing right-hand side, or append a new assignment.
    #[default]
    Upsert,
    MergeInto,
    MergeFrom,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "upsert" => Ok(MergeStrategy::Upsert),
            "merge_into" | "merge-into" => Ok(MergeStrategy::MergeInto),
            "merge_from" | "merge-from" => Ok(MergeStrategy::MergeFrom),
            other => Err(format!(
                "invalid strategy: {other} (expected upsert, merge_into, merge_from)"
            )),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeStrategy::Upsert => "upsert",
            MergeStrategy::MergeInto => "merge_into",
            MergeStrategy::MergeFrom => "merge_from",
        })
    }
}

/// Fail early for strategies that have no implementation, before any I/O.
pub fn check_strategy(strategy: MergeStrategy) -> Result<(), Error> {
    match strategy {
        MergeStrategy::Upsert => Ok(()),
        other => Err(Error::NotImplemented(format!("the {other} strategy"))),
    }
}

/// Return `source` with `literal` written at the location named by `query_str`.
///
/// A right-hand side shared by chained targets (`A = B = 1`) is never
/// rewritten; a new assignment is appended instead so the other targets keep
/// their value.
pub fn emit(
    source: &str,
    query_str: &str,
    literal: &str,
    strategy: MergeStrategy,
) -> Result<String, Error> {
    check_strategy(strategy)?;

    let path = QueryPath::parse(query_str)?;
    let literal = literal.trim();
    let value = materialize(&parser::parse_expression(literal)?);
    if let Some((rest, src)) = value.find_unsupported() {
        return Err(Error::UnsupportedLiteral {
            path: format!("{path}{rest}"),
            source_text: src.to_string(),
        });
    }

    let source = normalize_newlines(source);
    let index = AssignmentIndex::from_source(&source)?;

    let edit = match path.segments.as_slice() {
        [] => {
            return Err(Error::InvalidQuery(
                "emit needs a target name, not the whole file".into(),
            ))
        }
        [name] => match index.last_plain(name) {
            Some(existing) if !existing.chained => Edit::Replace(existing.value_span.clone()),
            _ => Edit::Append(format!("{name} = {literal}")),
        },
        [name, key] => {
            if !index.contains(name) {
                return Err(Error::NoSuchAssignment(name.clone()));
            }
            match index.last_subscript(name, key) {
                Some(existing) if !existing.chained => {
                    Edit::Replace(existing.value_span.clone())
                }
                _ => Edit::Append(format!(
                    "{name}[{}] = {literal}",
                    Value::String(key.clone()).repr()
                )),
            }
        }
        _ => {
            return Err(Error::NotImplemented(format!(
                "emitting below two path segments: {path}"
            )))
        }
    };

    Ok(apply(&source, edit, literal, &path))
}

enum Edit {
    Replace(Range<usize>),
    Append(String),
}

fn apply(source: &str, edit: Edit, literal: &str, path: &QueryPath) -> String {
    match edit {
        Edit::Replace(span) => {
            info!("replacing {path} at bytes {}..{}", span.start, span.end);
            let mut out = String::with_capacity(source.len() + literal.len());
            out.push_str(&source[..span.start]);
            out.push_str(literal);
            out.push_str(&source[span.end..]);
            out
        }
        Edit::Append(line) => {
            info!("appending {line}");
            let mut out = source.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&line);
            out.push('\n');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;

    const SRC: &str = "DEBUG = True  # dev\n\nCACHES = {}\nCACHES['default'] = {'BACKEND': 'x'}\n";

    fn upsert(query: &str, literal: &str) -> Result<String, Error> {
        emit(SRC, query, literal, MergeStrategy::Upsert)
    }

    #[test]
    fn replace_plain_assignment() {
        assert_eq!(
            upsert(".DEBUG", "False").unwrap(),
            "DEBUG = False  # dev\n\nCACHES = {}\nCACHES['default'] = {'BACKEND': 'x'}\n"
        );
    }

    #[test]
    fn append_new_name() {
        let out = upsert(".ALLOWED_HOSTS", "['*']").unwrap();
        assert!(out.starts_with(SRC));
        assert!(out.ends_with("ALLOWED_HOSTS = ['*']\n"));
    }

    #[test]
    fn replace_subscript_assignment() {
        let out = upsert(".CACHES.default", "{'BACKEND': 'y'}").unwrap();
        assert!(out.contains("CACHES['default'] = {'BACKEND': 'y'}\n"));
        assert!(!out.contains("'x'"));
    }

    #[test]
    fn append_subscript_assignment() {
        let out = upsert(".CACHES.sessions", "None").unwrap();
        assert!(out.ends_with("CACHES['sessions'] = None\n"));
    }

    #[test]
    fn chained_assignment_is_not_rewritten() {
        let src = "A = B = 1\nD = {}\nD['k'] = E = 2\n";
        let out = emit(src, ".B", "5", MergeStrategy::Upsert).unwrap();
        assert_eq!(out, format!("{src}B = 5\n"));
        let index = AssignmentIndex::from_source(&out).unwrap();
        assert_eq!(index.effective_value("A"), Some(Value::Number(Number::Int(1))));
        assert_eq!(index.effective_value("B"), Some(Value::Number(Number::Int(5))));

        let out = emit(src, ".D.k", "3", MergeStrategy::Upsert).unwrap();
        assert_eq!(out, format!("{src}D['k'] = 3\n"));
    }

    #[test]
    fn subscript_on_missing_name() {
        assert!(matches!(
            upsert(".MISSING.key", "1"),
            Err(Error::NoSuchAssignment(name)) if name == "MISSING"
        ));
    }

    #[test]
    fn emitted_value_is_queryable() {
        let out = upsert(".DEBUG", "False").unwrap();
        let index = AssignmentIndex::from_source(&out).unwrap();
        assert_eq!(index.effective_value("DEBUG"), Some(Value::Bool(false)));
    }

    #[test]
    fn rejects_non_literals() {
        assert!(matches!(
            upsert(".DEBUG", "os.environ['DEBUG']"),
            Err(Error::UnsupportedLiteral { .. })
        ));
        assert!(matches!(upsert(".DEBUG", "'open"), Err(Error::Syntax { .. })));
        assert!(matches!(upsert(".DEBUG", "A = 1"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn deep_paths_and_whole_file() {
        assert!(matches!(
            upsert(".CACHES.default.BACKEND", "'y'"),
            Err(Error::NotImplemented(_))
        ));
        assert!(matches!(upsert(".", "1"), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn merge_strategies_not_implemented() {
        for strategy in [MergeStrategy::MergeInto, MergeStrategy::MergeFrom] {
            assert!(matches!(
                emit(SRC, ".DEBUG", "False", strategy),
                Err(Error::NotImplemented(_))
            ));
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!("upsert".parse::<MergeStrategy>(), Ok(MergeStrategy::Upsert));
        assert_eq!("merge_into".parse::<MergeStrategy>(), Ok(MergeStrategy::MergeInto));
        assert_eq!("merge_from".parse::<MergeStrategy>(), Ok(MergeStrategy::MergeFrom));
        assert!("replace".parse::<MergeStrategy>().is_err());
    }
}
