pub mod path;

use log::debug;

use crate::error::Error;
use crate::index::AssignmentIndex;
use crate::input::normalize_newlines;
use crate::template;
use crate::value::Value;

use self::path::QueryPath;

/// How a query result is post-processed.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Format template applied to the resolved mapping.
    pub format_str: Option<String>,
    /// Evaluate slicing suffixes in template placeholders.
    pub eval: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions {
            format_str: None,
            eval: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The `.` query: the normalized source text, verbatim.
    Source(String),
    Value(Value),
}

/// Execute a query string against settings source text.
pub fn query(source: &str, query_str: &str, options: &QueryOptions) -> Result<QueryResult, Error> {
    let source = normalize_newlines(source);
    let path = QueryPath::parse(query_str)?;

    if path.is_whole_file() {
        if options.format_str.is_some() {
            return Err(Error::TemplateEval(
                "a format string needs a dict, not the whole file".into(),
            ));
        }
        return Ok(QueryResult::Source(source.into_owned()));
    }

    let index = AssignmentIndex::from_source(&source)?;

    match &options.format_str {
        Some(format_str) => {
            // Only the entries a placeholder references have to be literals.
            let value = locate(&index, &path)?;
            if let Value::Unsupported(src) = &value {
                return Err(Error::UnsupportedLiteral {
                    path: path.to_string(),
                    source_text: src.clone(),
                });
            }
            let rendered =
                template::render(format_str, &value, options.eval).map_err(|e| match e {
                    Error::UnsupportedLiteral { path: rest, source_text } => {
                        Error::UnsupportedLiteral {
                            path: format!("{path}{rest}"),
                            source_text,
                        }
                    }
                    other => other,
                })?;
            Ok(QueryResult::Value(Value::String(rendered)))
        }
        None => Ok(QueryResult::Value(resolve(&index, &path)?)),
    }
}

/// Resolve a non-empty path against an index.
///
/// The base value is the name's effective value (see
/// [`AssignmentIndex::effective_value`]), so `.CONST.key` reaches both
/// `CONST = {'key': ...}` and `CONST['key'] = ...`.
pub fn resolve(index: &AssignmentIndex, path: &QueryPath) -> Result<Value, Error> {
    let found = locate(index, path)?;
    if let Some((rest, src)) = found.find_unsupported() {
        return Err(Error::UnsupportedLiteral {
            path: format!("{path}{rest}"),
            source_text: src.to_string(),
        });
    }
    Ok(found)
}

/// Walk to the node `path` names without requiring the subtree below it to
/// be fully literal.
pub fn locate(index: &AssignmentIndex, path: &QueryPath) -> Result<Value, Error> {
    let Some(name) = path.name() else {
        return Err(Error::InvalidQuery(
            "the whole-file query has no value".into(),
        ));
    };

    let base = index
        .effective_value(name)
        .ok_or_else(|| Error::NoSuchAssignment(name.to_string()))?;
    debug!(
        "{name}: {} assignment(s), walking {:?}",
        index.for_name(name).count(),
        path.keys()
    );

    path::walk(&base, name, path.keys()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Key, Number};

    const SETTINGS: &str = r#"
import os

DEBUG = False

ADMINS = (('Admin', 'example@example.com'),)

DATABASES = {
    'default': {
        'ENGINE': 'django.db.backends.postgresql',
        'NAME': 'taiga',
        'USER': 'taiga',
        'HOST': 'localhost',
        'PORT': 5432,
    }
}

REST_FRAMEWORK = {
    'DEFAULT_THROTTLE_RATES': {
        'anon-write': '20/min',
        'anon-read': None,
    },
}

MEDIA_ROOT = os.path.join(BASE_DIR, 'media')

CACHES = {}
CACHES['default'] = {'BACKEND': 'locmem', 'TIMEOUT': 300}
"#;

    fn run(q: &str) -> Result<QueryResult, Error> {
        query(SETTINGS, q, &QueryOptions::default())
    }

    fn value(q: &str) -> Value {
        match run(q).unwrap() {
            QueryResult::Value(v) => v,
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[test]
    fn query_whole_file() {
        assert_eq!(run(".").unwrap(), QueryResult::Source(SETTINGS.to_string()));
    }

    #[test]
    fn query_whole_file_normalizes_newlines() {
        let src = "A = 1\r\nB = 2\rC = 3\n";
        assert_eq!(
            query(src, ".", &QueryOptions::default()).unwrap(),
            QueryResult::Source("A = 1\nB = 2\nC = 3\n".into())
        );
    }

    #[test]
    fn query_whole_file_skips_parsing() {
        let src = "A = 'unterminated\n";
        assert!(query(src, ".", &QueryOptions::default()).is_ok());
    }

    #[test]
    fn query_bool() {
        assert_eq!(value(".DEBUG"), Value::Bool(false));
    }

    #[test]
    fn query_nested_tuple() {
        assert_eq!(
            value(".ADMINS"),
            Value::Tuple(vec![Value::Tuple(vec![
                Value::String("Admin".into()),
                Value::String("example@example.com".into()),
            ])])
        );
    }

    #[test]
    fn query_hyphenated_leaf() {
        assert_eq!(
            value(".REST_FRAMEWORK.DEFAULT_THROTTLE_RATES.anon-write"),
            Value::String("20/min".into())
        );
        assert_eq!(
            value(".REST_FRAMEWORK.DEFAULT_THROTTLE_RATES.anon-read"),
            Value::None
        );
    }

    #[test]
    fn query_sequence_index() {
        assert_eq!(
            value(".ADMINS.0.1"),
            Value::String("example@example.com".into())
        );
    }

    #[test]
    fn query_format_str() {
        let options = QueryOptions {
            format_str: Some(
                r#"{ENGINE[ENGINE.rfind(".")+1:]}://{USER}@{HOST}:{PORT}/{NAME}"#.into(),
            ),
            eval: true,
        };
        assert_eq!(
            query(SETTINGS, ".DATABASES.default", &options).unwrap(),
            QueryResult::Value(Value::String(
                "postgresql://taiga@localhost:5432/taiga".into()
            ))
        );
    }

    #[test]
    fn query_format_str_without_eval() {
        let options = QueryOptions {
            format_str: Some(r#"{ENGINE[ENGINE.rfind(".")+1:]}://{HOST}"#.into()),
            eval: false,
        };
        assert_eq!(
            query(SETTINGS, ".DATABASES.default", &options).unwrap(),
            QueryResult::Value(Value::String(
                "django.db.backends.postgresql://localhost".into()
            ))
        );
    }

    #[test]
    fn query_format_on_whole_file_errors() {
        let options = QueryOptions {
            format_str: Some("{A}".into()),
            eval: true,
        };
        assert!(matches!(
            query(SETTINGS, ".", &options),
            Err(Error::TemplateEval(_))
        ));
    }

    #[test]
    fn query_subscript_assignment() {
        assert_eq!(
            value(".CACHES.default.TIMEOUT"),
            Value::Number(Number::Int(300))
        );
        let caches = value(".CACHES");
        assert!(caches.as_dict().unwrap().contains_key(&Key::from("default")));
    }

    #[test]
    fn query_unknown_name() {
        assert!(matches!(
            run(".SECRET_KEY"),
            Err(Error::NoSuchAssignment(name)) if name == "SECRET_KEY"
        ));
    }

    #[test]
    fn query_unknown_key() {
        assert!(matches!(
            run(".DATABASES.nonexistent"),
            Err(Error::PathNotFound { segment, .. }) if segment == "nonexistent"
        ));
    }

    #[test]
    fn query_unsupported_value() {
        assert!(matches!(
            run(".MEDIA_ROOT"),
            Err(Error::UnsupportedLiteral { .. })
        ));
    }

    #[test]
    fn query_semicolon_separated_assignments() {
        let opts = QueryOptions::default();
        assert_eq!(
            query("A = 1; B = 2\n", ".A", &opts).unwrap(),
            QueryResult::Value(Value::Number(Number::Int(1)))
        );
        assert_eq!(
            query("A = 1; B = 2\n", ".B", &opts).unwrap(),
            QueryResult::Value(Value::Number(Number::Int(2)))
        );
        assert_eq!(
            query("C = 1;\n", ".C", &opts).unwrap(),
            QueryResult::Value(Value::Number(Number::Int(1)))
        );
    }

    #[test]
    fn query_format_ignores_unreferenced_computed_entries() {
        let src = "DB = {'HOST': 'db', 'PORT': 5432, 'PASSWORD': os.environ['PW']}\n";
        let with_format = |template: &str, eval: bool| {
            query(
                src,
                ".DB",
                &QueryOptions {
                    format_str: Some(template.into()),
                    eval,
                },
            )
        };
        assert_eq!(
            with_format("{HOST}:{PORT}", true).unwrap(),
            QueryResult::Value(Value::String("db:5432".into()))
        );
        assert_eq!(
            with_format("{HOST[:1]}", false).unwrap(),
            QueryResult::Value(Value::String("db".into()))
        );
        match with_format("{HOST}:{PASSWORD}", true) {
            Err(Error::UnsupportedLiteral { path, source_text }) => {
                assert_eq!(path, ".DB.PASSWORD");
                assert_eq!(source_text, "os.environ['PW']");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            with_format("{HOST[PASSWORD]}", true),
            Err(Error::UnsupportedLiteral { .. })
        ));
        // Without a format string the whole value must still be literal.
        assert!(matches!(
            query(src, ".DB", &QueryOptions::default()),
            Err(Error::UnsupportedLiteral { .. })
        ));
    }

    #[test]
    fn query_format_on_computed_value() {
        let options = QueryOptions {
            format_str: Some("{X}".into()),
            eval: true,
        };
        assert!(matches!(
            query("A = dict(X=1)\n", ".A", &options),
            Err(Error::UnsupportedLiteral { path, .. }) if path == ".A"
        ));
    }

    #[test]
    fn query_invalid_path() {
        assert!(matches!(run("DEBUG"), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn query_syntax_error() {
        let src = "DEBUG = False\nSECRET = 'oops\n";
        assert!(matches!(
            query(src, ".DEBUG", &QueryOptions::default()),
            Err(Error::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn query_dict_paths_are_monotonic() {
        let whole = value(".DATABASES.default");
        for (key, expected) in whole.as_dict().unwrap() {
            let Key::String(key) = key else {
                panic!("string keys expected")
            };
            assert_eq!(&value(&format!(".DATABASES.default.{key}")), expected);
        }
    }
}
