//! Typed resource instances

use std::collections::HashMap;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use super::ResourceKind;
use crate::codec::path;

/// One remote entity instance, tagged with its kind
///
/// Fields are kept as JSON because most of them are nested API objects the
/// engine never interprets; the kind decides which top-level fields exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    kind: ResourceKind,
    fields: Map<String, Value>,
}

impl Resource {
    /// Create an empty resource of the given kind
    pub fn new(kind: ResourceKind) -> Self {
        Resource {
            kind,
            fields: Map::new(),
        }
    }

    /// Build a resource from a JSON object, keeping only declared fields
    pub fn from_json(kind: ResourceKind, value: Value) -> Result<Self> {
        let object = match value {
            Value::Object(object) => object,
            other => bail!("expected a JSON object for {}, got {}", kind, other),
        };

        let mut fields = Map::new();
        for (key, field) in object {
            if kind.declares(&key) {
                fields.insert(key, field);
            } else {
                log::debug!("Dropping undeclared {} field '{}'", kind, key);
            }
        }

        Ok(Resource { kind, fields })
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Read a (possibly dotted) field path
    pub fn get(&self, field_path: &str) -> Option<&Value> {
        let (head, rest) = split_head(field_path);
        let top = self.fields.get(head)?;
        match rest {
            None => Some(top),
            Some(rest) => path::get(top, rest),
        }
    }

    /// Set a (possibly dotted) field path, creating intermediate objects
    pub fn set(&mut self, field_path: &str, value: Value) {
        let (head, rest) = split_head(field_path);
        match rest {
            None => {
                self.fields.insert(head.to_string(), value);
            }
            Some(rest) => {
                let top = self
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                path::set(top, rest, value);
            }
        }
    }

    /// Remove a top-level field
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Primary identifier as text, if present and non-empty
    pub fn id(&self) -> Option<String> {
        self.fields
            .get(self.kind.id_field())
            .and_then(scalar_text)
            .filter(|id| !id.is_empty())
    }

    /// Top-level scalar fields as URI substitution parameters
    pub fn params(&self) -> HashMap<String, String> {
        self.fields
            .iter()
            .filter_map(|(key, value)| scalar_text(value).map(|text| (key.clone(), text)))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Text form of a scalar JSON value (strings verbatim, numbers and bools printed)
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn split_head(field_path: &str) -> (&str, Option<&str>) {
    match field_path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (field_path, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_drops_undeclared_fields() {
        let resource = Resource::from_json(
            ResourceKind::Campaign,
            json!({
                "campaignId": "7",
                "displayName": "Spring",
                "somethingElse": true
            }),
        )
        .unwrap();

        assert_eq!(resource.get("displayName"), Some(&json!("Spring")));
        assert!(resource.get("somethingElse").is_none());
        assert_eq!(resource.id(), Some("7".to_string()));
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(Resource::from_json(ResourceKind::Campaign, json!([1, 2])).is_err());
    }

    #[test]
    fn test_dotted_set_and_get() {
        let mut resource = Resource::new(ResourceKind::LineItem);
        resource.set("flight.dateRange.startDate", json!({"year": 2024}));

        assert_eq!(
            resource.get("flight.dateRange.startDate.year"),
            Some(&json!(2024))
        );
        assert!(resource.get("flight.missing.year").is_none());
    }

    #[test]
    fn test_params_only_scalars() {
        let resource = Resource::from_json(
            ResourceKind::LineItem,
            json!({
                "advertiserId": "1",
                "lineItemId": 2,
                "flight": {"flightDateType": "X"}
            }),
        )
        .unwrap();

        let params = resource.params();
        assert_eq!(params.get("advertiserId").map(String::as_str), Some("1"));
        assert_eq!(params.get("lineItemId").map(String::as_str), Some("2"));
        assert!(!params.contains_key("flight"));
    }

    #[test]
    fn test_empty_id_is_absent() {
        let resource =
            Resource::from_json(ResourceKind::Creative, json!({"creativeId": ""})).unwrap();
        assert_eq!(resource.id(), None);
    }
}
