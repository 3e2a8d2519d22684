use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

/// Rewrite `\r\n` and lone `\r` line endings as `\n`.
pub fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Whether `path` designates standard input (`-`, or no path at all).
pub fn is_stdin(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p.as_os_str() == "-")
}

/// Read a whole source file, or standard input, with newlines normalized.
pub fn read_source(path: Option<&Path>) -> std::io::Result<String> {
    let raw = match path {
        Some(p) if !is_stdin(Some(p)) => std::fs::read_to_string(p)?,
        _ => read_all(std::io::stdin().lock())?,
    };
    Ok(normalize_newlines(&raw).into_owned())
}

/// Drain an already-open reader.
pub fn read_all(mut reader: impl Read) -> std::io::Result<String> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    Ok(buf)
}
