//! Events emitted after committed transitions
//!
//! Events are fire-and-forget notifications for the notification
//! collaborator. They are published only after the state change is stored.

use crate::{
    ChecklistId, ChecklistStatus, CommentId, LevelId, VersionId, WorkflowId, WorkflowStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ReviewEvent {
    #[serde(rename = "workflow.created")]
    WorkflowCreated {
        workflow_id: WorkflowId,
        version_id: VersionId,
        workflow_type: String,
    },
    #[serde(rename = "workflow.review_started")]
    ReviewStarted { workflow_id: WorkflowId },
    #[serde(rename = "level.activated")]
    LevelActivated {
        workflow_id: WorkflowId,
        level_id: LevelId,
        level_number: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        deadline: Option<DateTime<Utc>>,
    },
    #[serde(rename = "level.approved")]
    LevelApproved {
        workflow_id: WorkflowId,
        level_id: LevelId,
    },
    #[serde(rename = "level.rejected")]
    LevelRejected {
        workflow_id: WorkflowId,
        level_id: LevelId,
        reason: Option<String>,
    },
    #[serde(rename = "workflow.revision_requested")]
    RevisionRequested { workflow_id: WorkflowId, round: u32 },
    #[serde(rename = "workflow.resubmitted")]
    Resubmitted {
        workflow_id: WorkflowId,
        round: u32,
        version_id: VersionId,
    },
    #[serde(rename = "checklist.evaluated")]
    ChecklistEvaluated {
        workflow_id: WorkflowId,
        checklist_id: ChecklistId,
        status: ChecklistStatus,
        overall_score: f64,
    },
    #[serde(rename = "comment.added")]
    CommentAdded {
        workflow_id: WorkflowId,
        level_id: LevelId,
        comment_id: CommentId,
    },
    #[serde(rename = "workflow.approved")]
    WorkflowApproved { workflow_id: WorkflowId },
    #[serde(rename = "workflow.rejected")]
    WorkflowRejected { workflow_id: WorkflowId },
}

impl ReviewEvent {
    /// Dotted event name, as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowCreated { .. } => "workflow.created",
            Self::ReviewStarted { .. } => "workflow.review_started",
            Self::LevelActivated { .. } => "level.activated",
            Self::LevelApproved { .. } => "level.approved",
            Self::LevelRejected { .. } => "level.rejected",
            Self::RevisionRequested { .. } => "workflow.revision_requested",
            Self::Resubmitted { .. } => "workflow.resubmitted",
            Self::ChecklistEvaluated { .. } => "checklist.evaluated",
            Self::CommentAdded { .. } => "comment.added",
            Self::WorkflowApproved { .. } => "workflow.approved",
            Self::WorkflowRejected { .. } => "workflow.rejected",
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        match self {
            Self::WorkflowCreated { workflow_id, .. }
            | Self::ReviewStarted { workflow_id }
            | Self::LevelActivated { workflow_id, .. }
            | Self::LevelApproved { workflow_id, .. }
            | Self::LevelRejected { workflow_id, .. }
            | Self::RevisionRequested { workflow_id, .. }
            | Self::Resubmitted { workflow_id, .. }
            | Self::ChecklistEvaluated { workflow_id, .. }
            | Self::CommentAdded { workflow_id, .. }
            | Self::WorkflowApproved { workflow_id }
            | Self::WorkflowRejected { workflow_id } => workflow_id,
        }
    }

    pub fn level_id(&self) -> Option<&LevelId> {
        match self {
            Self::LevelActivated { level_id, .. }
            | Self::LevelApproved { level_id, .. }
            | Self::LevelRejected { level_id, .. }
            | Self::CommentAdded { level_id, .. } => Some(level_id),
            _ => None,
        }
    }

    /// Whether the event ends the workflow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowApproved { .. } | Self::WorkflowRejected { .. }
        )
    }

    pub fn terminal_status(&self) -> Option<WorkflowStatus> {
        match self {
            Self::WorkflowApproved { .. } => Some(WorkflowStatus::Approved),
            Self::WorkflowRejected { .. } => Some(WorkflowStatus::Rejected),
            _ => None,
        }
    }
}

/// An event stamped for delivery
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewEventEnvelope {
    pub id: Uuid,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ReviewEvent,
}

impl ReviewEventEnvelope {
    pub fn new(event: ReviewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_name_matches_serde_tag() {
        let events = vec![
            ReviewEvent::LevelApproved {
                workflow_id: WorkflowId::new("wf"),
                level_id: LevelId::new("l1"),
            },
            ReviewEvent::RevisionRequested {
                workflow_id: WorkflowId::new("wf"),
                round: 2,
            },
            ReviewEvent::WorkflowRejected {
                workflow_id: WorkflowId::new("wf"),
            },
        ];
        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.name());
            assert_eq!(json["payload"]["workflow_id"], "wf");
        }
    }

    #[test]
    fn test_envelope_flattens_event() {
        let envelope = ReviewEventEnvelope::new(ReviewEvent::LevelRejected {
            workflow_id: WorkflowId::new("wf"),
            level_id: LevelId::new("l2"),
            reason: Some("missing asset".into()),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["event"], "level.rejected");
        assert_eq!(json["payload"]["reason"], "missing asset");
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_terminal_events() {
        let approved = ReviewEvent::WorkflowApproved {
            workflow_id: WorkflowId::new("wf"),
        };
        assert!(approved.is_terminal());
        assert_eq!(approved.terminal_status(), Some(WorkflowStatus::Approved));
        assert_eq!(approved.workflow_id().as_str(), "wf");
    }
}
