//! HTML escaping for untrusted text.

use serde_json::Value;
use std::fmt::Display;

/// Escape the five HTML-significant characters in `input`'s string form.
///
/// Not idempotent: escaping escaped text escapes the entities again.
pub fn escape_html(input: impl Display) -> String {
    escape_str(&input.to_string())
}

/// Escape a string slice.
pub fn escape_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape an optional JSON value.
///
/// Absent renders as `undefined`, `null` as `null`, strings as their
/// contents and everything else as compact JSON.
pub fn escape_value(input: Option<&Value>) -> String {
    match input {
        None => escape_str("undefined"),
        Some(Value::String(s)) => escape_str(s),
        Some(other) => escape_str(&other.to_string()),
    }
}
