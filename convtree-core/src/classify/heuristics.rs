//! Content heuristics shared by the classifier rules.

use serde_json::Value;

/// Parse content as a JSON object or array.
///
/// Scalars (`42`, `"text"`, `true`) are valid JSON but never count as
/// structured content.
pub fn parse_structured_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

pub fn is_json_object(content: &str) -> bool {
    parse_structured_json(content).is_some_and(|v| v.is_object())
}

pub fn is_structured_json(content: &str) -> bool {
    parse_structured_json(content).is_some()
}

/// Categorize error text. Matching is case-insensitive and ordered:
/// "command not found" must win over the generic "not found" phrasing.
pub fn error_type(content: &str) -> &'static str {
    let lower = content.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["command not found", "is not recognized as", "executable file not found"]) {
        "command_not_found"
    } else if has(&[
        "no such file",
        "file not found",
        "does not exist",
        "enoent",
        "directory not found",
    ]) {
        "file_not_found"
    } else if has(&[
        "permission denied",
        "eacces",
        "operation not permitted",
        "access denied",
    ]) {
        "permission_denied"
    } else if has(&["timed out", "timeout", "deadline exceeded"]) {
        "timeout"
    } else if has(&[
        "connection refused",
        "econnrefused",
        "connection reset",
        "network is unreachable",
        "could not resolve host",
    ]) {
        "connection_error"
    } else if has(&["syntaxerror", "syntax error", "unexpected token", "parse error"]) {
        "syntax_error"
    } else {
        "generic"
    }
}

/// Line and char counts used for the inline/popup decision.
pub fn size_of(content: &str) -> (usize, usize) {
    (content.lines().count(), content.chars().count())
}

/// Split `mcp__<server>__<tool>` into `(server, tool)`.
pub fn split_mcp_name<'a>(name: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = name.strip_prefix(prefix)?;
    let (server, tool) = rest.split_once("__")?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}
