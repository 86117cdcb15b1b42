//! Dotted field paths over nested JSON objects
//!
//! A path like `"flight.dateRange.startDate"` addresses
//! `record["flight"]["dateRange"]["startDate"]`. Only objects are descended
//! into: arrays are leaves, and a numeric-looking segment is still an object key.

use serde_json::{Map, Value};

/// Flatten nested objects into `dotted.path -> leaf` pairs
///
/// Scalars, arrays and empty objects are leaves. A non-object root has no
/// fields and flattens to an empty map.
pub fn flatten(value: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    if let Value::Object(object) = value {
        flatten_into("", object, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Object(nested) if !nested.is_empty() => flatten_into(&path, nested, out),
            _ => {
                out.insert(path, value.clone());
            }
        }
    }
}

/// Resolve a dotted path
///
/// Returns `None` when any segment is missing or an intermediate value is
/// null or not an object. A null leaf is returned as `Some(Value::Null)`.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate objects as needed
///
/// Intermediate values that are not objects are replaced by objects.
pub fn set(value: &mut Value, path: &str, new_value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = value;

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(object) = current else {
            return;
        };

        if segments.peek().is_none() {
            object.insert(segment.to_string(), new_value);
            return;
        }

        current = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Remove the value at a dotted path, returning it
pub fn remove(value: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => get_mut(value, parent)?.as_object_mut()?.remove(leaf),
        None => value.as_object_mut()?.remove(path),
    }
}

/// Overlay `patch` onto `base`
///
/// Objects are merged key by key; anything else in `patch` replaces what
/// `base` holds at that position.
pub fn merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

fn get_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}
