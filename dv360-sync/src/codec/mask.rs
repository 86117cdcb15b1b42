//! Patch mask computation
//!
//! An update only sends the fields that actually changed. Cell text loses
//! type information (`"5"` for `5`, `"true"` for `true`), so values are
//! compared loosely rather than with `==`.

use serde_json::{Map, Value};

use super::path;
use crate::model::{Resource, UPDATE_TIME_FIELD};

/// Field paths of `modified` whose values differ from `original`
///
/// Top-level fields are compared after overlaying `modified` onto
/// `original`, so a partial nested object (from a dotted column) only
/// differs when one of the leaves it carries does. Kinds that mask nested
/// fields compare and report every leaf path separately. The identifier and
/// `updateTime` are never reported.
pub fn changed_fields(original: &Resource, modified: &Resource) -> Vec<String> {
    let kind = modified.kind();
    let candidates: Map<String, Value> = if kind.masks_nested_fields() {
        path::flatten(&modified.to_json())
    } else {
        let merged = overlay(original, modified);
        modified
            .fields()
            .keys()
            .map(|field| (field.clone(), merged.get(field).cloned().unwrap_or(Value::Null)))
            .collect()
    };

    candidates
        .into_iter()
        .filter(|(field_path, _)| {
            let top = field_path.split('.').next().unwrap_or(field_path);
            top != kind.id_field() && top != UPDATE_TIME_FIELD
        })
        .filter(|(field_path, value)| {
            let before = original.get(field_path).unwrap_or(&Value::Null);
            !loosely_equal(value, before)
        })
        .map(|(field_path, _)| field_path)
        .collect()
}

/// `original` with every value of `modified` laid over it
///
/// Nested objects are merged, so fields the row does not carry keep their
/// server values. This is the body sent with an update mask.
pub fn overlay(original: &Resource, modified: &Resource) -> Resource {
    let mut merged = original.clone();
    for (field, value) in modified.fields() {
        let mut combined = original.get(field).cloned().unwrap_or(Value::Null);
        path::merge(&mut combined, value);
        merged.set(field, combined);
    }
    merged
}

/// Comma-joined [`changed_fields`]; empty means no update is necessary
pub fn compute_mask(original: &Resource, modified: &Resource) -> String {
    changed_fields(original, modified).join(",")
}

/// Structural equality with scalar coercion
///
/// Objects and arrays compare element-wise, a null field equals a missing
/// one, numbers compare numerically with numeric strings, and booleans
/// compare with their text form or with `0`/`1`.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            let text = s.trim();
            text == n.to_string()
                || match (text.parse::<f64>(), n.as_f64()) {
                    (Ok(x), Some(y)) => x == y,
                    _ => false,
                }
        }
        (Value::String(s), Value::Bool(b)) | (Value::Bool(b), Value::String(s)) => {
            s.trim().eq_ignore_ascii_case(&b.to_string())
        }
        (Value::Number(n), Value::Bool(b)) | (Value::Bool(b), Value::Number(n)) => {
            n.as_f64() == Some(if *b { 1.0 } else { 0.0 })
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| loosely_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            let missing = Value::Null;
            x.iter()
                .all(|(key, value)| loosely_equal(value, y.get(key).unwrap_or(&missing)))
                && y.iter()
                    .all(|(key, value)| loosely_equal(value, x.get(key).unwrap_or(&missing)))
        }
        _ => false,
    }
}
