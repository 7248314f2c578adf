//! Error taxonomy for review operations

use crate::{
    ApproverId, ChecklistId, ChecklistItemId, ChecklistShortfall, DeliverableId, LevelId,
    VersionId, WorkflowId,
};

/// Errors that can occur in review operations.
///
/// Every variant carries the state that was actually observed so the caller
/// can decide whether to correct the request or re-read and retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    #[error("Invalid transition on {entity}: expected {expected}, found {actual}")]
    InvalidTransition {
        entity: String,
        expected: String,
        actual: String,
    },

    #[error("Approver {approver} is not assigned to level {level_number}")]
    UnauthorizedApprover {
        approver: ApproverId,
        level_number: u32,
    },

    #[error("Checklist incomplete: {0}")]
    ChecklistIncomplete(ChecklistShortfall),

    #[error("Concurrent modification of {entity}: expected {expected}, found {found}")]
    ConcurrentModification {
        entity: String,
        expected: String,
        found: String,
    },

    #[error("Unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error("Version {version_id} already has active workflow {workflow_id}")]
    VersionAlreadyHasActiveWorkflow {
        version_id: VersionId,
        workflow_id: WorkflowId,
    },

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("No workflow for version: {0}")]
    NoWorkflowForVersion(VersionId),

    #[error("Level not found: {0}")]
    LevelNotFound(LevelId),

    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    #[error("Deliverable not found: {0}")]
    DeliverableNotFound(DeliverableId),

    #[error("Checklist not found: {0}")]
    ChecklistNotFound(ChecklistId),

    #[error("Checklist item not found: {0}")]
    ChecklistItemNotFound(ChecklistItemId),

    #[error("Workflow {0} already has a checklist")]
    ChecklistAlreadyAttached(WorkflowId),

    #[error("Resubmission rejected: {0}")]
    ResubmissionRejected(String),

    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ReviewError {
    pub fn invalid_transition(
        entity: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether re-reading and retrying may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_)
                | Self::NoWorkflowForVersion(_)
                | Self::LevelNotFound(_)
                | Self::VersionNotFound(_)
                | Self::DeliverableNotFound(_)
                | Self::ChecklistNotFound(_)
                | Self::ChecklistItemNotFound(_)
        )
    }
}

/// Result type alias for review operations
pub type ReviewResult<T> = Result<T, ReviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_observed_state() {
        let err = ReviewError::invalid_transition("level 2", "in_progress", "pending");
        assert_eq!(
            err.to_string(),
            "Invalid transition on level 2: expected in_progress, found pending"
        );

        let err = ReviewError::ChecklistIncomplete(ChecklistShortfall {
            checklist_id: ChecklistId::new("cl-1"),
            pending: vec!["Logo usage".into()],
            failed: vec![],
        });
        assert_eq!(
            err.to_string(),
            "Checklist incomplete: 1 required item(s) pending, 0 failed"
        );
    }

    #[test]
    fn test_only_concurrency_errors_are_retryable() {
        let conflict = ReviewError::ConcurrentModification {
            entity: "workflow wf".into(),
            expected: "state 3".into(),
            found: "state 4".into(),
        };
        assert!(conflict.is_retryable());
        assert!(!ReviewError::UnknownWorkflowType("x".into()).is_retryable());
        assert!(ReviewError::LevelNotFound(LevelId::new("l")).is_not_found());
    }
}
