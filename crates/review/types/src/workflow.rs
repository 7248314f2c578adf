//! The approval workflow bound to a version

use crate::{
    ApproverId, Checklist, DeliverableId, Level, LevelId, ReentryPolicy, ReviewError,
    ReviewResult, VersionId, WorkflowId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow lifecycle.
///
/// `draft -> in_review <-> revision_requested`, terminating in `approved`
/// (final level plus passed checklist) or `rejected` (cancellation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    InReview,
    RevisionRequested,
    Approved,
    Rejected,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::RevisionRequested => "revision_requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Historical record of one revision cycle. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionRound {
    /// The round that was sent back for rework
    pub round_number: u32,
    /// Workflow status the round produced
    pub status: WorkflowStatus,
    pub rejected_level: u32,
    pub requested_by: ApproverId,
    pub requested_by_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One approval process for one version
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub version_id: VersionId,
    pub deliverable_id: DeliverableId,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    /// 1-based; `levels.len() + 1` only once approved
    pub current_level: u32,
    /// Starts at 1, always `revision_rounds.len() + 1`
    pub revision_round: u32,
    pub levels: Vec<Level>,
    pub revision_rounds: Vec<RevisionRound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Checklist>,
    /// Versions this workflow was bound to before the current one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_history: Vec<VersionId>,
    pub reentry: ReentryPolicy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl Workflow {
    pub fn new(
        version_id: VersionId,
        deliverable_id: DeliverableId,
        workflow_type: impl Into<String>,
        levels: Vec<Level>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            version_id,
            deliverable_id,
            workflow_type: workflow_type.into(),
            status: WorkflowStatus::Draft,
            current_level: 1,
            revision_round: 1,
            levels,
            revision_rounds: Vec::new(),
            checklist: None,
            version_history: Vec::new(),
            reentry: ReentryPolicy::FirstLevel,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancellation_reason: None,
        }
    }

    pub fn with_checklist(mut self, checklist: Checklist) -> Self {
        self.checklist = Some(checklist);
        self
    }

    pub fn with_reentry(mut self, reentry: ReentryPolicy) -> Self {
        self.reentry = reentry;
        self
    }

    // ── Levels ───────────────────────────────────────────────────────

    pub fn level(&self, level_number: u32) -> Option<&Level> {
        let index = level_number.checked_sub(1)? as usize;
        self.levels.get(index)
    }

    pub fn level_mut(&mut self, level_number: u32) -> Option<&mut Level> {
        let index = level_number.checked_sub(1)? as usize;
        self.levels.get_mut(index)
    }

    pub fn level_by_id(&self, id: &LevelId) -> Option<&Level> {
        self.levels.iter().find(|l| &l.id == id)
    }

    pub fn level_by_id_mut(&mut self, id: &LevelId) -> Option<&mut Level> {
        self.levels.iter_mut().find(|l| &l.id == id)
    }

    /// The level under review, `None` once the workflow is approved
    pub fn current(&self) -> Option<&Level> {
        self.level(self.current_level)
    }

    pub fn final_level_number(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn is_final_level(&self, level_number: u32) -> bool {
        level_number == self.final_level_number()
    }

    /// Level a resubmission resumes at after `rejected_level` sent it back
    pub fn reentry_level(&self, rejected_level: u32) -> u32 {
        match self.reentry {
            ReentryPolicy::FirstLevel => 1,
            ReentryPolicy::RejectedLevel => rejected_level.max(1),
        }
    }

    pub fn last_revision(&self) -> Option<&RevisionRound> {
        self.revision_rounds.last()
    }

    // ── Guards ───────────────────────────────────────────────────────

    pub fn ensure_not_terminal(&self) -> ReviewResult<()> {
        if self.status.is_terminal() {
            return Err(ReviewError::invalid_transition(
                format!("workflow {}", self.id),
                "a non-terminal status",
                self.status.as_str(),
            ));
        }
        Ok(())
    }

    pub fn ensure_status(&self, expected: WorkflowStatus) -> ReviewResult<()> {
        if self.status != expected {
            return Err(ReviewError::invalid_transition(
                format!("workflow {}", self.id),
                expected.as_str(),
                self.status.as_str(),
            ));
        }
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Approver, ApproverIdentity, ApproverType, RejectionPolicy};

    fn level(number: u32) -> Level {
        let approver = Approver::new(
            ApproverIdentity::new(format!("a{number}"), "A"),
            ApproverType::user(format!("a{number}"), "A"),
            true,
        );
        Level::new(number, format!("L{number}"), vec![approver], RejectionPolicy::FailFast)
    }

    fn workflow() -> Workflow {
        Workflow::new(
            VersionId::generate(),
            DeliverableId::generate(),
            "standard",
            vec![level(1), level(2), level(3)],
        )
    }

    #[test]
    fn test_new_workflow_starts_in_draft() {
        let wf = workflow();
        assert_eq!(wf.status, WorkflowStatus::Draft);
        assert_eq!(wf.current_level, 1);
        assert_eq!(wf.revision_round, 1);
        assert_eq!(wf.current().map(|l| l.level_number), Some(1));
    }

    #[test]
    fn test_level_lookup_is_one_based() {
        let mut wf = workflow();
        assert!(wf.level(0).is_none());
        assert_eq!(wf.level(3).map(|l| l.name.as_str()), Some("L3"));
        assert!(wf.level(4).is_none());
        assert!(wf.is_final_level(3));

        wf.current_level = 4;
        assert!(wf.current().is_none());
    }

    #[test]
    fn test_reentry_level_follows_policy() {
        let wf = workflow();
        assert_eq!(wf.reentry_level(3), 1);

        let wf = wf.with_reentry(ReentryPolicy::RejectedLevel);
        assert_eq!(wf.reentry_level(3), 3);
    }

    #[test]
    fn test_terminal_guard() {
        let mut wf = workflow();
        assert!(wf.ensure_not_terminal().is_ok());

        wf.status = WorkflowStatus::Rejected;
        let err = wf.ensure_not_terminal().unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { ref actual, .. } if actual == "rejected"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkflowStatus::RevisionRequested).unwrap();
        assert_eq!(json, "\"revision_requested\"");
    }
}
