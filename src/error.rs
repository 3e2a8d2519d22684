use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("no such assignment: {0}")]
    NoSuchAssignment(String),

    #[error("path not found: {segment} (at {path})")]
    PathNotFound { segment: String, path: String },

    #[error("unsupported literal at {path}: {source_text}")]
    UnsupportedLiteral { path: String, source_text: String },

    #[error("key not found in format string: {0}")]
    KeyNotFound(String),

    #[error("template evaluation error: {0}")]
    TemplateEval(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
