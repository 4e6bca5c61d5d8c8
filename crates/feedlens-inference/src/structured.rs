//! Pulling a JSON object out of free-form model output.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or append a second
//! object. The scan below finds the first syntactically complete object by
//! brace depth, ignoring braces inside string literals.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use feedlens_core::{Error, Result};

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?").expect("valid regex"));

/// Remove markdown code fences.
pub fn strip_fences(raw: &str) -> String {
    FENCE.replace_all(raw, "").trim().to_string()
}

/// Byte index of the `}` closing the object that starts at `s[0]`.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// First complete, parseable JSON object in `raw`.
pub fn extract_json_object(raw: &str) -> Result<Map<String, JsonValue>> {
    let cleaned = strip_fences(raw);

    for (start, _) in cleaned.match_indices('{') {
        let tail = &cleaned[start..];
        let Some(end) = find_matching_brace(tail) else {
            continue;
        };
        if let Ok(JsonValue::Object(map)) = serde_json::from_str(&tail[..=end]) {
            return Ok(map);
        }
    }

    let preview: String = cleaned.chars().take(200).collect();
    Err(Error::MalformedOutput(format!(
        "no JSON object found in model output: {preview}"
    )))
}

/// String field that tolerates numbers, booleans, and null.
pub fn lenient_string(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// List field that also accepts a single comma-separated string.
pub fn lenient_string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|v| lenient_string(Some(v)))
            .collect(),
        Some(JsonValue::String(s)) => s
            .split([',', '،'])
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
