//! Assigned targeting option reconciliation
//!
//! A line item's targeting is a set of assigned options. The sheet holds the
//! desired set; this module diffs it against the server and applies the
//! difference with one bulk edit call:
//! - options only in the desired set are created
//! - options only on the server are deleted
//! - options in both are left alone
//!
//! Options are matched by content. Server-assigned fields (`name`,
//! `assignedTargetingOptionId`, `inheritance`) are ignored when comparing.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};

use super::client::{ensure_resolved, fetch_all_pages};
use super::path;
use super::request::ApiRequest;
use super::transport::HttpTransport;
use crate::model::{Resource, ResourceKind};

/// Fields the server assigns to an option; never sent, never compared
pub const OUTPUT_ONLY_FIELDS: &[&str] = &["name", "assignedTargetingOptionId", "inheritance"];

const TARGETING_TYPE_FIELD: &str = "targetingType";
const OPTION_ID_FIELD: &str = "assignedTargetingOptionId";
const LIST_FIELD: &str = "assignedTargetingOptions";
const CREATED_FIELD: &str = "createdAssignedTargetingOptions";

/// Options of one targeting type to create
#[derive(Debug, Clone, PartialEq)]
pub struct CreateGroup {
    pub targeting_type: String,
    pub options: Vec<Value>,
}

/// Assigned option ids of one targeting type to delete
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteGroup {
    pub targeting_type: String,
    pub option_ids: Vec<String>,
}

/// Result of diffing current against desired options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkEditPlan {
    pub creates: Vec<CreateGroup>,
    pub deletes: Vec<DeleteGroup>,
    /// Current options that are also desired, as the server has them
    pub retained: Vec<Value>,
}

impl BulkEditPlan {
    /// No request is needed
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.deletes.is_empty()
    }

    pub fn create_count(&self) -> usize {
        self.creates.iter().map(|group| group.options.len()).sum()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.iter().map(|group| group.option_ids.len()).sum()
    }

    /// Request body of the bulk edit call
    pub fn to_body(&self) -> Value {
        let create_requests: Vec<Value> = self
            .creates
            .iter()
            .map(|group| {
                json!({
                    "targetingType": group.targeting_type,
                    "assignedTargetingOptions": group.options,
                })
            })
            .collect();
        let delete_requests: Vec<Value> = self
            .deletes
            .iter()
            .map(|group| {
                json!({
                    "targetingType": group.targeting_type,
                    "assignedTargetingOptionIds": group.option_ids,
                })
            })
            .collect();

        json!({
            "createRequests": create_requests,
            "deleteRequests": delete_requests,
        })
    }
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub created: usize,
    pub deleted: usize,
    /// Options the server reported as created
    pub applied: Vec<Value>,
    /// Options left untouched
    pub retained: Vec<Value>,
}

impl Reconciliation {
    /// The owner's options after the edit: retained followed by applied
    pub fn options(&self) -> Vec<Value> {
        self.retained
            .iter()
            .chain(self.applied.iter())
            .cloned()
            .collect()
    }
}

/// Identity of an option for set difference
///
/// Output-only fields are dropped and object keys sorted recursively, so two
/// options with the same content always produce the same key.
pub fn canonical_key(option: &Value) -> String {
    let mut stripped = option.clone();
    if let Value::Object(object) = &mut stripped {
        for field in OUTPUT_ONLY_FIELDS {
            object.remove(*field);
        }
    }
    let mut out = String::new();
    write_canonical(&stripped, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&object[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Diff `current` (server state) against `desired`
///
/// Groups keep the order in which their targeting type first appears.
pub fn plan(current: &[Value], desired: &[Value]) -> Result<BulkEditPlan> {
    let current_keys: HashSet<String> = current.iter().map(canonical_key).collect();
    let desired_keys: HashSet<String> = desired.iter().map(canonical_key).collect();

    let mut result = BulkEditPlan::default();

    let mut seen = HashSet::new();
    for option in desired {
        let key = canonical_key(option);
        if current_keys.contains(&key) || !seen.insert(key) {
            continue;
        }
        let targeting_type = targeting_type_of(option)?;
        let payload = strip_output_only(option);

        match result
            .creates
            .iter_mut()
            .find(|group| group.targeting_type == targeting_type)
        {
            Some(group) => group.options.push(payload),
            None => result.creates.push(CreateGroup {
                targeting_type,
                options: vec![payload],
            }),
        }
    }

    for option in current {
        if desired_keys.contains(&canonical_key(option)) {
            result.retained.push(option.clone());
            continue;
        }
        let targeting_type = targeting_type_of(option)?;
        let Some(option_id) = option.get(OPTION_ID_FIELD).and_then(Value::as_str) else {
            bail!("Assigned targeting option has no {}: {}", OPTION_ID_FIELD, option);
        };

        match result
            .deletes
            .iter_mut()
            .find(|group| group.targeting_type == targeting_type)
        {
            Some(group) => group.option_ids.push(option_id.to_string()),
            None => result.deletes.push(DeleteGroup {
                targeting_type,
                option_ids: vec![option_id.to_string()],
            }),
        }
    }

    Ok(result)
}

/// Parse the options cell of a row: empty means the row does not manage targeting
pub fn parse_options(cell: &str) -> Result<Option<Vec<Value>>> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(cell).context("Targeting options are not valid JSON")?;
    match value {
        Value::Array(options) => {
            if let Some(bad) = options.iter().find(|option| !option.is_object()) {
                bail!("Targeting options must be objects, got {}", bad);
            }
            Ok(Some(options))
        }
        other => bail!("Targeting options must be a JSON array, got {}", other),
    }
}

fn targeting_type_of(option: &Value) -> Result<String> {
    option
        .get(TARGETING_TYPE_FIELD)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .with_context(|| format!("Targeting option has no {}: {}", TARGETING_TYPE_FIELD, option))
}

fn strip_output_only(option: &Value) -> Value {
    match option {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(key, _)| !OUTPUT_ONLY_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Applies desired targeting to line items
#[derive(Clone)]
pub struct TargetingReconciler {
    transport: Arc<dyn HttpTransport>,
}

impl TargetingReconciler {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Options currently assigned to `owner`
    pub async fn current(&self, owner: &Resource) -> Result<Vec<Value>> {
        let uri = self.owner_uri(owner, "bulkListLineItemAssignedTargetingOptions")?;
        fetch_all_pages(self.transport.as_ref(), &uri, LIST_FIELD)
            .await
            .context("Failed to list assigned targeting options")
    }

    /// Make the owner's assigned options equal to `desired`
    pub async fn reconcile(&self, owner: &Resource, desired: &[Value]) -> Result<Reconciliation> {
        let current = self.current(owner).await?;
        let plan = plan(&current, desired)?;

        if plan.is_empty() {
            log::debug!("Targeting of {} {} already up to date", owner.kind(), owner.id().unwrap_or_default());
            return Ok(Reconciliation {
                retained: plan.retained,
                ..Default::default()
            });
        }

        let uri = self.owner_uri(owner, "bulkEditLineItemAssignedTargetingOptions")?;
        log::debug!(
            "Bulk editing targeting: {} to create, {} to delete",
            plan.create_count(),
            plan.delete_count()
        );

        let mut response = self
            .transport
            .send(ApiRequest::post(&uri, plan.to_body()))
            .await
            .context("Failed to edit assigned targeting options")?;

        let applied = match response.get_mut(CREATED_FIELD).map(Value::take) {
            Some(Value::Array(created)) => created,
            _ => Vec::new(),
        };

        log::info!(
            "Targeting of {} {}: {} created, {} deleted",
            owner.kind(),
            owner.id().unwrap_or_default(),
            plan.create_count(),
            plan.delete_count()
        );

        Ok(Reconciliation {
            created: plan.create_count(),
            deleted: plan.delete_count(),
            applied,
            retained: plan.retained,
        })
    }

    fn owner_uri(&self, owner: &Resource, method: &str) -> Result<String> {
        if !owner.kind().owns_targeting() {
            bail!("{} entities do not carry assigned targeting options", owner.kind());
        }
        let params = owner
            .params()
            .into_iter()
            .map(|(key, value)| (key, urlencoding::encode(&value).into_owned()))
            .collect();
        let uri = format!(
            "{}:{}",
            path::resolve(&ResourceKind::LineItem.single_template(), &params),
            method
        );
        ensure_resolved(&uri)?;
        Ok(uri)
    }
}
