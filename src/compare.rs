//! Value comparison and diff rendering.
//!
//! Values are compared structurally the way a JSON round-trip sees them:
//! object key order and numeric representation (`1` vs `1.0`) don't matter.

use serde_json::{Number, Value};
use similar::TextDiff;

/// Lines of context around each hunk in [`diff`].
const DIFF_CONTEXT: usize = 3;

/// Structural equality over decoded JSON values.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => false,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    // Exact integer comparison first so large values don't lose precision
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Render expected and actual values as text for diffing.
///
/// Two strings are returned verbatim so line diffs show their literal
/// content; anything else is pretty-printed as JSON with sorted keys.
pub fn render(expected: &Value, actual: &Value) -> serde_json::Result<(String, String)> {
    if let (Value::String(e), Value::String(a)) = (expected, actual) {
        return Ok((e.clone(), a.clone()));
    }
    Ok((
        serde_json::to_string_pretty(expected)?,
        serde_json::to_string_pretty(actual)?,
    ))
}

/// Line-based unified diff between expected and actual text.
///
/// Returns an empty string when the inputs are identical.
pub fn diff(expected: &str, actual: &str) -> String {
    if expected == actual {
        return String::new();
    }
    TextDiff::from_lines(expected, actual)
        .unified_diff()
        .context_radius(DIFF_CONTEXT)
        .missing_newline_hint(false)
        .header("expected", "actual")
        .to_string()
}
