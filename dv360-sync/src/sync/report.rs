//! Results of a sync pass

use serde::Serialize;

use super::classify::RowAction;
use super::row::sheet_row_number;
use crate::model::ResourceKind;

/// Status text written to the log column
pub mod status {
    pub const OK: &str = "OK";
    pub const NO_CHANGES: &str = "OK (no changes)";
    pub const DELETED: &str = "DELETED";
}

/// What happened to one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Created { id: String },
    Updated { mask: String },
    Unchanged,
    Deleted { id: String },
    Failed { message: String },
}

impl RowStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, RowStatus::Failed { .. })
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowStatus::Created { id } => write!(f, "created {}", id),
            RowStatus::Updated { mask } if mask.is_empty() => write!(f, "updated"),
            RowStatus::Updated { mask } => write!(f, "updated ({})", mask),
            RowStatus::Unchanged => write!(f, "unchanged"),
            RowStatus::Deleted { id } => write!(f, "deleted {}", id),
            RowStatus::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

/// Outcome of one data row (0-based index as read at the start of the pass)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    pub action: Option<RowAction>,
    #[serde(flatten)]
    pub status: RowStatus,
    /// Targeting options created plus deleted for this row
    pub targeting_changes: usize,
}

impl RowOutcome {
    /// Row number as the spreadsheet shows it
    pub fn sheet_row(&self) -> usize {
        sheet_row_number(self.row)
    }
}

/// Everything one pass over a sheet did
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub sheet: String,
    pub kind: ResourceKind,
    pub outcomes: Vec<RowOutcome>,
}

impl SyncReport {
    pub fn new(sheet: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            sheet: sheet.into(),
            kind,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, action: Option<RowAction>, status: RowStatus) {
        self.outcomes.push(RowOutcome {
            row,
            action,
            status,
            targeting_changes: 0,
        });
    }

    pub fn created(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Created { .. }))
    }

    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Updated { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Unchanged))
    }

    pub fn deleted(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Deleted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(RowStatus::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Outcome recorded for a data row
    pub fn outcome(&self, row: usize) -> Option<&RowOutcome> {
        self.outcomes.iter().find(|outcome| outcome.row == row)
    }

    fn count(&self, predicate: impl Fn(&RowStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}
