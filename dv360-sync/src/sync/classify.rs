//! Row classification
//!
//! Each pass decides per row what to do from three cells: the raw server
//! state (`_raw`), the identifier and the optional explicit `_action`. A row
//! that matches no action, or more than one, is an error for that row only.

use serde::Serialize;

/// Literal raw-state marker requesting deletion
pub const DELETE_MARKER: &str = "DELETE";

/// What the sync pass does with a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowAction {
    Create,
    Modify,
    Delete,
}

impl RowAction {
    /// Parse an `_action` cell; empty means "infer from state"
    pub fn parse(text: &str) -> Result<Option<Self>, ClassifyError> {
        match text.trim().to_uppercase().as_str() {
            "" => Ok(None),
            "CREATE" => Ok(Some(RowAction::Create)),
            "MODIFY" => Ok(Some(RowAction::Modify)),
            "DELETE" => Ok(Some(RowAction::Delete)),
            _ => Err(ClassifyError::UnknownAction(text.trim().to_string())),
        }
    }
}

impl std::fmt::Display for RowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowAction::Create => write!(f, "CREATE"),
            RowAction::Modify => write!(f, "MODIFY"),
            RowAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// State of a row inferred from its raw-state and identifier cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Never synchronized: no raw state, no identifier
    New,
    /// Raw state is the literal `DELETE`
    DeleteMarked,
    /// Synchronized before; may or may not have been edited
    MaybeModified,
}

impl RowState {
    pub fn of(raw: &str, id: &str) -> Self {
        let raw = raw.trim();
        if raw == DELETE_MARKER {
            RowState::DeleteMarked
        } else if raw.is_empty() && id.trim().is_empty() {
            RowState::New
        } else {
            RowState::MaybeModified
        }
    }
}

/// Why a row could not be classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    UnknownAction(String),
    NoAction,
    Ambiguous(Vec<RowAction>),
    MissingIdentity(RowAction),
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyError::UnknownAction(action) => write!(
                f,
                "unknown action '{}' (expected CREATE, MODIFY, DELETE or empty)",
                action
            ),
            ClassifyError::NoAction => write!(f, "row matches no action"),
            ClassifyError::Ambiguous(actions) => write!(
                f,
                "row is ambiguous, it matches {}",
                actions
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
            ClassifyError::MissingIdentity(action) => {
                write!(f, "cannot {} a row without an identifier", action)
            }
        }
    }
}

impl std::error::Error for ClassifyError {}

/// Decide the single action for a row
pub fn classify(raw: &str, id: &str, action: &str) -> Result<RowAction, ClassifyError> {
    let explicit = RowAction::parse(action)?;
    let state = RowState::of(raw, id);
    let has_id = !id.trim().is_empty();

    let mut matches = Vec::new();
    if explicit == Some(RowAction::Create) || (explicit.is_none() && state == RowState::New) {
        matches.push(RowAction::Create);
        if has_id {
            // An identifier means the entity already exists
            matches.push(RowAction::Modify);
        }
    }
    if explicit == Some(RowAction::Modify)
        || (explicit.is_none() && state == RowState::MaybeModified)
    {
        matches.push(RowAction::Modify);
    }
    if explicit == Some(RowAction::Delete) || state == RowState::DeleteMarked {
        matches.push(RowAction::Delete);
    }
    matches.dedup();

    match matches.as_slice() {
        [] => Err(ClassifyError::NoAction),
        [single] => {
            if *single != RowAction::Create && !has_id {
                Err(ClassifyError::MissingIdentity(*single))
            } else {
                Ok(*single)
            }
        }
        _ => Err(ClassifyError::Ambiguous(matches)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_is_create() {
        assert_eq!(classify("", "", ""), Ok(RowAction::Create));
        assert_eq!(classify(" ", " ", "create"), Ok(RowAction::Create));
    }

    #[test]
    fn test_synchronized_row_is_modify() {
        assert_eq!(classify("{\"campaignId\":\"7\"}", "7", ""), Ok(RowAction::Modify));
        // Identifier typed in by hand, never pulled
        assert_eq!(classify("", "7", ""), Ok(RowAction::Modify));
        assert_eq!(classify("{}", "7", "MODIFY"), Ok(RowAction::Modify));
    }

    #[test]
    fn test_delete_marker_and_action() {
        assert_eq!(classify("DELETE", "55", ""), Ok(RowAction::Delete));
        assert_eq!(classify("{}", "55", "delete"), Ok(RowAction::Delete));
        assert_eq!(classify("DELETE", "55", "DELETE"), Ok(RowAction::Delete));
    }

    #[test]
    fn test_create_with_identifier_is_ambiguous() {
        assert_eq!(
            classify("", "7", "CREATE"),
            Err(ClassifyError::Ambiguous(vec![RowAction::Create, RowAction::Modify]))
        );
    }

    #[test]
    fn test_conflicting_marker_and_action() {
        assert_eq!(
            classify("DELETE", "7", "MODIFY"),
            Err(ClassifyError::Ambiguous(vec![RowAction::Modify, RowAction::Delete]))
        );
        assert!(matches!(
            classify("DELETE", "", "CREATE"),
            Err(ClassifyError::Ambiguous(_))
        ));
    }

    #[test]
    fn test_missing_identifier() {
        assert_eq!(
            classify("DELETE", "", ""),
            Err(ClassifyError::MissingIdentity(RowAction::Delete))
        );
        assert_eq!(
            classify("", "", "MODIFY"),
            Err(ClassifyError::MissingIdentity(RowAction::Modify))
        );
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            classify("", "", "upsert"),
            Err(ClassifyError::UnknownAction("upsert".to_string()))
        );
    }

    #[test]
    fn test_error_messages() {
        let message = ClassifyError::Ambiguous(vec![RowAction::Create, RowAction::Modify]).to_string();
        assert_eq!(message, "row is ambiguous, it matches CREATE and MODIFY");
    }
}
