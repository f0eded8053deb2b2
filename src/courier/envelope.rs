//! Response-shape normalisation for the courier API.
//!
//! The provider wraps payloads inconsistently: lists arrive as `data.data`,
//! `data`, or a bare array depending on the endpoint, and single records as
//! `data` or bare. Everything goes through these helpers instead of being
//! unwrapped at each call site.

use serde_json::Value;

use crate::models::shipment::{Location, LocationKind};

/// Returns the `data` member if present, otherwise the payload itself.
pub fn unwrap_data(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            _ => Value::Object(map),
        },
        other => other,
    }
}

/// Finds the item array in a list response: `data.data`, then `data`, then
/// the payload itself. Returns `None` if no array is found.
pub fn unwrap_list(payload: Value) -> Option<Vec<Value>> {
    match unwrap_data(payload) {
        Value::Array(items) => Some(items),
        inner @ Value::Object(_) => match unwrap_data(inner) {
            Value::Array(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Projects raw list items onto `{id, name}` using the `<kind>_id` and
/// `<kind>_name` fields. Items missing either field are dropped.
pub fn project_locations(items: Vec<Value>, kind: LocationKind) -> Vec<Location> {
    let id_field = format!("{}_id", kind.prefix());
    let name_field = format!("{}_name", kind.prefix());

    items
        .iter()
        .filter_map(|item| {
            let id = item.get(&id_field).and_then(as_i64)?;
            let name = item.get(&name_field)?.as_str()?.trim().to_string();
            Some(Location { id, name })
        })
        .collect()
}

/// Extracts a human-readable error message from a provider error body.
///
/// Tries `message`, `error` (string) and `error.message`, in that order.
pub fn provider_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    let candidate = v
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| v.get("error").and_then(Value::as_str))
        .or_else(|| v.pointer("/error/message").and_then(Value::as_str))?;
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads a string-or-number field as a string, e.g. a consignment id.
pub fn string_field(v: &Value, field: &str) -> Option<String> {
    match v.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Caps a raw body for inclusion in an error message.
pub fn truncate(body: &str, max_chars: usize) -> String {
    let mut out: String = body.chars().take(max_chars).collect();
    if body.chars().count() > max_chars {
        out.push('…');
    }
    out
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
