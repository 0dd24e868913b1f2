//! Recovery of a JSON object from a language model's free-text reply.
//!
//! Models asked for JSON still wrap it in code fences or add a sentence of
//! commentary. The passes here undo that; anything that still fails to parse
//! is reported as "no result", never as an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Recover the JSON object embedded in `raw`.
///
/// Returns `None` for empty input, unparseable content, or JSON that is not an
/// object.
pub fn recover_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let unfenced = strip_fences(trimmed);
    let candidate = slice_outer_braces(&unfenced);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "model reply is not valid JSON");
            None
        }
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` marker and a trailing ```` ``` ````.
fn strip_fences(s: &str) -> String {
    static OPEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("valid regex"));
    static CLOSE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));

    let opened = OPEN_RE.replace(s, "");
    CLOSE_RE.replace(&opened, "").into_owned()
}

/// Narrow to the span from the first `{` to the last `}` when both exist in order.
fn slice_outer_braces(s: &str) -> &str {
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if end > start => &s[start..=end],
        _ => s,
    }
}
