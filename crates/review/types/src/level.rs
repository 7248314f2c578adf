//! Approval levels, approver slots, decisions and comments

use crate::{ApproverId, CommentId, LevelId, RejectionPolicy, ReviewError, ReviewResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Approver Types ───────────────────────────────────────────────────

/// How an approver requirement is expressed on a level.
///
/// `Role` is never stored on an approver slot directly: it is resolved to
/// concrete identities before slots are created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApproverType {
    /// A specific internal user
    User { id: ApproverId, name: String },
    /// Anyone holding a role at instantiation time
    Role { role: String },
    /// Someone outside the organisation, identified by email
    External { email: String, name: String },
}

impl ApproverType {
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::User {
            id: ApproverId::new(id),
            name: name.into(),
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::Role { role: role.into() }
    }

    pub fn external(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self::External {
            email: email.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Role { .. } => "role",
            Self::External { .. } => "external",
        }
    }
}

/// An identity resolved by the identity collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverIdentity {
    pub id: ApproverId,
    pub name: String,
}

impl ApproverIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ApproverId::new(id),
            name: name.into(),
        }
    }
}

// ── Approver Slot ────────────────────────────────────────────────────

/// Decision state of one approver slot within the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApproverStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// A decision submitted by an approver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_status(&self) -> ApproverStatus {
        match self {
            Self::Approve => ApproverStatus::Approved,
            Self::Reject => ApproverStatus::Rejected,
        }
    }
}

/// One approver slot on a level
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Approver {
    pub id: ApproverId,
    pub name: String,
    /// The requirement this slot was created from
    pub assigned_via: ApproverType,
    /// Whether this approver belongs to the level's quorum
    pub required: bool,
    pub status: ApproverStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl ApproverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl Approver {
    pub fn new(identity: ApproverIdentity, assigned_via: ApproverType, required: bool) -> Self {
        Self {
            id: identity.id,
            name: identity.name,
            assigned_via,
            required,
            status: ApproverStatus::Pending,
            approved_at: None,
            decided_at: None,
            comments: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApproverStatus::Pending
    }

    fn reset(&mut self) {
        self.status = ApproverStatus::Pending;
        self.approved_at = None;
        self.decided_at = None;
        self.comments = None;
    }
}

/// Historical record of one decision. Never rewritten, survives slot resets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Review round the decision was made in
    pub round: u32,
    pub level_number: u32,
    pub approver_id: ApproverId,
    pub approver_name: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

// ── Comments ─────────────────────────────────────────────────────────

/// Category of a level comment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    #[default]
    General,
    Feedback,
    Issue,
    Approval,
    Rejection,
    Other(String),
}

/// A free-text entry on a level's thread. Append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub level_id: LevelId,
    pub comment_type: CommentType,
    pub content: String,
    pub author_name: String,
    /// Review round the comment was written in
    pub round: u32,
    pub created_at: DateTime<Utc>,
}

// ── Level ────────────────────────────────────────────────────────────

/// Lifecycle of an approval level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LevelStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl LevelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for LevelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sequential approval stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    /// 1-based position in the workflow
    pub level_number: u32,
    pub name: String,
    pub description: String,
    /// Requirements the approver slots were resolved from
    pub approver_types: Vec<ApproverType>,
    pub status: LevelStatus,
    pub approvers: Vec<Approver>,
    pub comments: Vec<Comment>,
    /// Every decision ever made on this level, across rounds
    pub decisions: Vec<DecisionRecord>,
    pub rejection_policy: RejectionPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_offset_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Level {
    pub fn new(
        level_number: u32,
        name: impl Into<String>,
        approvers: Vec<Approver>,
        rejection_policy: RejectionPolicy,
    ) -> Self {
        Self {
            id: LevelId::generate(),
            level_number,
            name: name.into(),
            description: String::new(),
            approver_types: Vec::new(),
            status: LevelStatus::Pending,
            approvers,
            comments: Vec::new(),
            decisions: Vec::new(),
            rejection_policy,
            deadline_offset_hours: None,
            deadline: None,
            activated_at: None,
            completed_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_approver_types(mut self, types: Vec<ApproverType>) -> Self {
        self.approver_types = types;
        self
    }

    pub fn with_deadline_offset(mut self, hours: Option<u32>) -> Self {
        self.deadline_offset_hours = hours;
        self
    }

    // ── Query ────────────────────────────────────────────────────────

    pub fn approver(&self, id: &ApproverId) -> Option<&Approver> {
        self.approvers.iter().find(|a| &a.id == id)
    }

    pub fn is_assigned(&self, id: &ApproverId) -> bool {
        self.approver(id).is_some()
    }

    pub fn required_approvers(&self) -> impl Iterator<Item = &Approver> {
        self.approvers.iter().filter(|a| a.required)
    }

    /// True when every approver in the quorum has approved
    pub fn quorum_approved(&self) -> bool {
        let mut required = self.required_approvers().peekable();
        required.peek().is_some() && required.all(|a| a.status == ApproverStatus::Approved)
    }

    /// True when no required approver is still pending
    pub fn quorum_decided(&self) -> bool {
        self.required_approvers().all(|a| !a.is_pending())
    }

    /// The first required approver who rejected, with their reason from `round`
    pub fn rejection(&self, round: u32) -> Option<(&Approver, Option<&str>)> {
        let approver = self
            .required_approvers()
            .find(|a| a.status == ApproverStatus::Rejected)?;
        let reason = self
            .decisions
            .iter()
            .rev()
            .find(|d| d.round == round && d.approver_id == approver.id)
            .and_then(|d| d.comment.as_deref());
        Some((approver, reason))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LevelStatus::InProgress && self.deadline.map(|d| now > d).unwrap_or(false)
    }

    pub fn decisions_in_round(&self, round: u32) -> impl Iterator<Item = &DecisionRecord> {
        self.decisions.iter().filter(move |d| d.round == round)
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Open the level for decisions
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.status = LevelStatus::InProgress;
        self.activated_at = Some(now);
        self.completed_at = None;
        self.deadline = self
            .deadline_offset_hours
            .map(|hours| now + Duration::hours(i64::from(hours)));
    }

    /// Return the level to its initial state for a new round.
    /// Comments and the decision log are kept.
    pub fn reset(&mut self) {
        self.status = LevelStatus::Pending;
        self.activated_at = None;
        self.completed_at = None;
        self.deadline = None;
        for approver in &mut self.approvers {
            approver.reset();
        }
    }

    pub fn settle(&mut self, status: LevelStatus, now: DateTime<Utc>) {
        self.status = status;
        self.completed_at = Some(now);
    }

    /// Write a decision into its approver slot and the decision log.
    ///
    /// The slot must exist and still be pending.
    pub fn apply_decision(&mut self, record: DecisionRecord) -> ReviewResult<()> {
        let level_number = self.level_number;
        let approver = self
            .approvers
            .iter_mut()
            .find(|a| a.id == record.approver_id)
            .ok_or_else(|| ReviewError::UnauthorizedApprover {
                approver: record.approver_id.clone(),
                level_number,
            })?;
        if !approver.is_pending() {
            return Err(ReviewError::invalid_transition(
                format!("approver {} on level {}", approver.id, level_number),
                "pending",
                approver.status.as_str(),
            ));
        }

        approver.status = record.decision.as_status();
        approver.decided_at = Some(record.decided_at);
        approver.approved_at = match record.decision {
            Decision::Approve => Some(record.decided_at),
            Decision::Reject => None,
        };
        approver.comments = record.comment.clone();
        self.decisions.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, required: bool) -> Approver {
        Approver::new(
            ApproverIdentity::new(id, id.to_uppercase()),
            ApproverType::user(id, id.to_uppercase()),
            required,
        )
    }

    fn record(approver: &str, decision: Decision, comment: Option<&str>) -> DecisionRecord {
        DecisionRecord {
            round: 1,
            level_number: 1,
            approver_id: ApproverId::new(approver),
            approver_name: approver.to_uppercase(),
            decision,
            comment: comment.map(str::to_string),
            decided_at: Utc::now(),
        }
    }

    fn make_level() -> Level {
        Level::new(
            1,
            "Internal Review",
            vec![slot("ana", true), slot("ben", true), slot("cy", false)],
            RejectionPolicy::FailFast,
        )
    }

    #[test]
    fn test_quorum_requires_all_required_approvers() {
        let mut level = make_level();
        assert!(!level.quorum_approved());

        level
            .apply_decision(record("ana", Decision::Approve, None))
            .unwrap();
        assert!(!level.quorum_approved());
        assert!(!level.quorum_decided());

        level
            .apply_decision(record("ben", Decision::Approve, None))
            .unwrap();
        // optional approver "cy" does not gate the quorum
        assert!(level.quorum_approved());
        assert!(level.quorum_decided());
    }

    #[test]
    fn test_empty_quorum_is_never_approved() {
        let level = Level::new(1, "Optional only", vec![slot("cy", false)], RejectionPolicy::FailFast);
        assert!(!level.quorum_approved());
    }

    #[test]
    fn test_apply_decision_rejects_repeat_and_unknown() {
        let mut level = make_level();
        level
            .apply_decision(record("ana", Decision::Approve, None))
            .unwrap();

        let repeat = level.apply_decision(record("ana", Decision::Approve, None));
        assert!(matches!(repeat, Err(ReviewError::InvalidTransition { .. })));

        let unknown = level.apply_decision(record("zed", Decision::Approve, None));
        assert!(matches!(
            unknown,
            Err(ReviewError::UnauthorizedApprover { .. })
        ));
        assert_eq!(level.decisions.len(), 1);
    }

    #[test]
    fn test_rejection_reports_reason() {
        let mut level = make_level();
        level
            .apply_decision(record("ben", Decision::Reject, Some("missing asset")))
            .unwrap();

        let (approver, reason) = level.rejection(1).unwrap();
        assert_eq!(approver.id, ApproverId::new("ben"));
        assert_eq!(reason, Some("missing asset"));
        assert_eq!(level.rejection(2).and_then(|(_, r)| r), None);
    }

    #[test]
    fn test_reset_keeps_history() {
        let mut level = make_level().with_deadline_offset(Some(24));
        let now = Utc::now();
        level.activate(now);
        assert_eq!(level.status, LevelStatus::InProgress);
        assert_eq!(level.deadline, Some(now + Duration::hours(24)));

        level
            .apply_decision(record("ana", Decision::Approve, Some("ok")))
            .unwrap();
        level.reset();

        assert_eq!(level.status, LevelStatus::Pending);
        assert!(level.approvers.iter().all(Approver::is_pending));
        assert!(level.deadline.is_none());
        assert_eq!(level.decisions.len(), 1);
    }

    #[test]
    fn test_overdue_only_while_in_progress() {
        let mut level = make_level().with_deadline_offset(Some(1));
        let start = Utc::now();
        level.activate(start);

        assert!(!level.is_overdue(start));
        assert!(level.is_overdue(start + Duration::hours(2)));

        level.settle(LevelStatus::Approved, start);
        assert!(!level.is_overdue(start + Duration::hours(2)));
    }

    #[test]
    fn test_approver_type_serde_tag() {
        let json = serde_json::to_value(ApproverType::role("qa-lead")).unwrap();
        assert_eq!(json["kind"], "role");
        assert_eq!(json["role"], "qa-lead");
    }
}
