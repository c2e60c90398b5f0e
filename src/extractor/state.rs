//! Decoding of the `window.__INITIAL_STATE__` blob embedded in profile pages.

use serde_json::Value;
use tracing::debug;

const INITIAL_STATE_MARKER: &str = "window.__INITIAL_STATE__=";

/// Maximum number of nested reactive wrappers peeled off a value.
const MAX_UNWRAP_DEPTH: usize = 5;

/// Rewrite the bare JS `undefined` literals the site emits into JSON `null`.
#[must_use]
pub fn normalize_js_literals(text: &str) -> String {
    text.replace(":undefined", ":null")
        .replace(",undefined", ",null")
}

/// Decode the first JSON value after the initial-state marker.
///
/// Returns `None` when the marker is missing (usually a login wall) or the value
/// does not parse. Trailing script text after the value is ignored.
#[must_use]
pub fn parse_initial_state(page_text: &str) -> Option<Value> {
    let start = page_text.find(INITIAL_STATE_MARKER)? + INITIAL_STATE_MARKER.len();
    let json_text = normalize_js_literals(&page_text[start..]);

    match serde_json::Deserializer::from_str(&json_text)
        .into_iter::<Value>()
        .next()?
    {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Failed to decode initial state");
            None
        }
    }
}

/// Peel `_rawValue` / `_value` reactive wrappers off a value.
#[must_use]
pub fn unwrap_reactive(value: &Value) -> &Value {
    let mut current = value;
    for _ in 0..=MAX_UNWRAP_DEPTH {
        let Some(obj) = current.as_object() else {
            break;
        };
        match obj.get("_rawValue").or_else(|| obj.get("_value")) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Collect every object carrying a `noteCard`, flattening nested arrays.
#[must_use]
pub fn collect_note_entries(value: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    if let Some(items) = value.as_array() {
        for item in items {
            if item.get("noteCard").is_some() {
                out.push(item);
            } else if item.is_array() {
                out.extend(collect_note_entries(item));
            }
        }
    }
    out
}
