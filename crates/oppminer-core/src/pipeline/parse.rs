//! Coercion of untyped LLM JSON into typed fields.
//!
//! The model's output is treated as hostile: every field is coerced to
//! its expected shape individually, and a malformed field is quarantined
//! (replaced by its default) rather than rejecting the whole idea. The
//! raw object is persisted alongside the typed columns, so nothing is
//! lost by coercion.

use serde_json::Value;

/// Coerce a field to a string. Numbers and bools stringify; null,
/// arrays, objects, and missing fields become empty.
pub fn string_field(object: &Value, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Coerce a field to a list of strings. A bare string becomes a
/// single-element list; non-string elements are stringified when scalar
/// and dropped otherwise.
pub fn string_list_field(object: &Value, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Coerce a field to a score in `0..=100`. Accepts numbers and numeric
/// strings; anything else is zero.
pub fn score_field(object: &Value, key: &str) -> f64 {
    let raw = match object.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Coerce a field to a list of integers. Floats with a fractional part,
/// non-numeric strings, and other shapes are filtered out.
pub fn int_list_field(object: &Value, key: &str) -> Vec<i64> {
    match object.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_i64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                }),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
