//! Traversal of reference objects (`{"typeId": …, "id"|"key": …}`) in JSON.

use serde_json::{Map, Value};

/// Calls `f` for every object carrying a string `typeId`.
///
/// Reference objects are not descended into, so an expanded `obj` is never
/// visited.
pub(crate) fn visit_references<F>(value: &Value, f: &mut F)
where
    F: FnMut(&Map<String, Value>),
{
    match value {
        Value::Object(map) if is_reference(map) => f(map),
        Value::Object(map) => {
            for child in map.values() {
                visit_references(child, f);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_references(item, f);
            }
        }
        _ => {}
    }
}

/// Mutable counterpart of [`visit_references`].
pub(crate) fn visit_references_mut<F>(value: &mut Value, f: &mut F)
where
    F: FnMut(&mut Map<String, Value>),
{
    match value {
        Value::Object(map) if is_reference(map) => f(map),
        Value::Object(map) => {
            for child in map.values_mut() {
                visit_references_mut(child, f);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_references_mut(item, f);
            }
        }
        _ => {}
    }
}

fn is_reference(map: &Map<String, Value>) -> bool {
    map.get("typeId").map(Value::is_string).unwrap_or(false)
        && (map.contains_key("id") || map.contains_key("key"))
}

pub(crate) fn string_field<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field).and_then(Value::as_str)
}
