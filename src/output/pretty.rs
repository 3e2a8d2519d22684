use crate::error::Error;
use crate::query::QueryResult;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Write string results without JSON quotes.
    pub raw: bool,
}

/// Render a query result as the text written to the output sink,
/// including the trailing newline.
pub fn format_result(result: &QueryResult, options: RenderOptions) -> Result<String, Error> {
    let mut out = match result {
        QueryResult::Source(text) => text.clone(),
        QueryResult::Value(value) => format_value(value, options)?,
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Format a Value as indented JSON, or as bare text for strings in raw mode.
pub fn format_value(value: &Value, options: RenderOptions) -> Result<String, Error> {
    // Raw mode: if the value is a string, output it without quotes
    if options.raw {
        if let Value::String(s) = value {
            return Ok(s.clone());
        }
    }

    if let Some((path, src)) = value.find_unsupported() {
        return Err(Error::UnsupportedLiteral {
            path: if path.is_empty() { ".".into() } else { path },
            source_text: src.to_string(),
        });
    }
    serde_json::to_string_pretty(value).map_err(|e| Error::Render(e.to_string()))
}
