//! Deliverable review domain types
//!
//! A deliverable is submitted for review as an immutable [`Version`]. Each
//! version under review is bound to one [`Workflow`]: an ordered sequence of
//! approval [`Level`]s, each with its own approver slots and comment thread,
//! optionally gated by a quality [`Checklist`] before final sign-off.
//!
//! Rejections push the workflow back for rework. Every cycle is kept as an
//! append-only [`RevisionRound`] record so the evidence of earlier rounds is
//! never overwritten.
//!
//! This crate only holds data and the small invariant-preserving mutations
//! on it. Transition rules live in `review-engine`, persistence in
//! `review-storage`.

#![deny(unsafe_code)]

mod checklist;
mod error;
mod event;
mod ids;
mod level;
mod template;
mod version;
mod workflow;

pub use checklist::{
    Checklist, ChecklistItem, ChecklistItemDefinition, ChecklistItemStatus, ChecklistShortfall,
    ChecklistStatus,
};
pub use error::{ReviewError, ReviewResult};
pub use event::{ReviewEvent, ReviewEventEnvelope};
pub use ids::{
    ApproverId, ChecklistId, ChecklistItemId, CommentId, DeliverableId, LevelId, VersionId,
    WorkflowId,
};
pub use level::{
    Approver, ApproverIdentity, ApproverStatus, ApproverType, Comment, CommentType, Decision,
    DecisionRecord, Level, LevelStatus,
};
pub use template::{
    ApproverRequirement, LevelDefinition, ReentryPolicy, RejectionPolicy, WorkflowTemplate,
};
pub use version::{Deliverable, Version};
pub use workflow::{RevisionRound, Workflow, WorkflowStatus};
