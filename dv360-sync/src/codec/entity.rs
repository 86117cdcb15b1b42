//! Row <-> resource mapping
//!
//! A sheet row is a list of cell strings aligned to a header of dotted field
//! paths. Reserved columns (prefixed with `_`) carry sync bookkeeping instead
//! of entity fields.

use serde_json::Value;

use super::translate::TranslatorSet;
use crate::model::{Resource, ResourceKind};

/// Reserved column names
pub mod reserved {
    /// Last synchronized server state as JSON, or the literal `DELETE`
    pub const RAW: &str = "_raw";
    /// Status or error text of the last pass
    pub const LOG: &str = "_log";
    /// Explicit action: `CREATE`, `MODIFY`, `DELETE` or empty
    pub const ACTION: &str = "_action";
    /// Assigned targeting options as a JSON array
    pub const TARGETING: &str = "_targeting";

    pub const ALL: &[&str] = &[RAW, LOG, ACTION, TARGETING];

    pub fn is_reserved(column: &str) -> bool {
        ALL.contains(&column)
    }
}

/// Converts rows of one resource kind to resources and back
#[derive(Debug, Clone)]
pub struct EntityCodec {
    kind: ResourceKind,
    translators: TranslatorSet,
}

impl EntityCodec {
    pub fn new(kind: ResourceKind, translators: TranslatorSet) -> Self {
        Self { kind, translators }
    }

    /// Codec with only the kind's default translators
    pub fn for_kind(kind: ResourceKind) -> Self {
        let mut translators = TranslatorSet::new();
        for (field_path, translator) in kind.default_translators() {
            translators.insert(*field_path, translator.build());
        }
        Self::new(kind, translators)
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn translators(&self) -> &TranslatorSet {
        &self.translators
    }

    /// Build a resource from a row
    ///
    /// Reserved columns and empty cells are skipped. Columns whose top-level
    /// field the kind does not declare are ignored.
    pub fn row_to_entity(&self, header: &[String], cells: &[String]) -> Resource {
        let mut resource = Resource::new(self.kind);

        for (column, field_path) in header.iter().enumerate() {
            let field_path = field_path.trim();
            if field_path.is_empty() || reserved::is_reserved(field_path) {
                continue;
            }

            let top = field_path.split('.').next().unwrap_or(field_path);
            if !self.kind.declares(top) {
                log::debug!("Ignoring column '{}': not a {} field", field_path, self.kind);
                continue;
            }

            let Some(cell) = cells.get(column) else {
                continue;
            };
            if cell.trim().is_empty() {
                continue;
            }

            let mut value = parse_cell(cell);
            if let Some(translator) = self.translators.get(field_path) {
                value = translator.to_entity(value);
            }
            resource.set(field_path, value);
        }

        resource
    }

    /// Render a resource as cells aligned to `header`
    pub fn entity_to_row(&self, resource: &Resource, header: &[String]) -> Vec<String> {
        header
            .iter()
            .map(|column| {
                let column = column.trim();
                match column {
                    reserved::RAW => resource.to_json().to_string(),
                    reserved::LOG | reserved::ACTION | reserved::TARGETING | "" => String::new(),
                    field_path => match resource.get(field_path) {
                        None | Some(Value::Null) => String::new(),
                        Some(value) => self
                            .translators
                            .get(field_path)
                            .and_then(|translator| translator.to_display(value))
                            .unwrap_or_else(|| format_cell(value)),
                    },
                }
            })
            .collect()
    }

    /// Header used when a sheet is created from scratch
    pub fn default_header(kind: ResourceKind) -> Vec<String> {
        let mut header = vec![reserved::ACTION.to_string(), kind.id_field().to_string()];
        header.extend(
            kind.fields()
                .iter()
                .filter(|field| **field != kind.id_field())
                .map(|field| field.to_string()),
        );
        if kind.owns_targeting() {
            header.push(reserved::TARGETING.to_string());
        }
        header.push(reserved::RAW.to_string());
        header.push(reserved::LOG.to_string());
        header
    }
}

/// Parse cell text: JSON for object/array-looking text, otherwise the literal string
pub fn parse_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str(trimmed) {
            Ok(value) => return value,
            Err(e) => log::debug!("Cell is not valid JSON, keeping text: {}", e),
        }
    }
    Value::String(cell.to_string())
}

/// Strings verbatim, everything else as JSON text
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
