//! Deliverable review workflow engine
//!
//! Drives a deliverable version through ordered approval levels. Each level
//! collects decisions from its assigned approvers; a rejection sends the
//! work back for revision, opening a new round, and the final level can be
//! held until a quality checklist passes.
//!
//! # Architecture
//!
//! The [`ReviewEngine`] composes specialized components:
//!
//! - [`LevelTemplateResolver`]: Maps a workflow type to its level definitions
//! - [`StateMachine`]: Level progression, approver aggregation, revision rounds
//! - [`ChecklistGate`]: Pass/fail evaluation of the quality checklist
//! - [`AuditTrail`]: Append-only, hash-chained history per workflow
//! - [`ReviewEventBus`]: Fire-and-forget distribution of emitted events
//!
//! Storage is reached through [`review_storage::ReviewStorage`]. Every
//! mutation is a conditional write, so the engine can be shared across
//! threads without a global lock.
//!
//! # Example
//!
//! ```rust
//! use review_engine::{DecisionOutcome, EngineConfig, ReviewEngine};
//! use review_types::{ApproverId, ApproverIdentity, Decision, WorkflowStatus};
//!
//! let config = EngineConfig::default()
//!     .with_role("team-lead", vec![ApproverIdentity::new("u-lee", "Lee")]);
//! let engine = ReviewEngine::in_memory(config).unwrap();
//!
//! let deliverable = engine.register_deliverable("Launch banner", "image").unwrap();
//! let version = engine
//!     .create_version(&deliverable.id, "s3://deliverables/banner-v1.png", "first draft")
//!     .unwrap();
//!
//! let workflow = engine.create_workflow(&version.id, "express").unwrap();
//! engine.start_review(&workflow.id).unwrap();
//!
//! let outcome = engine
//!     .record_approver_decision(
//!         &workflow.id,
//!         &workflow.levels[0].id,
//!         &ApproverId::new("u-lee"),
//!         Decision::Approve,
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(outcome, DecisionOutcome::WorkflowApproved);
//! assert_eq!(
//!     engine.get_workflow(&version.id).unwrap().status,
//!     WorkflowStatus::Approved
//! );
//! ```

#![deny(unsafe_code)]

pub mod audit_trail;
pub mod checklist_gate;
pub mod config;
pub mod event_bus;
pub mod orchestrator;
pub mod role_directory;
pub mod state_machine;
pub mod template_resolver;

pub use audit_trail::{
    comment_entry, decision_entry, event_entries, event_entry, verify_records, AuditTrail,
    ChainVerification,
};
pub use checklist_gate::{ChecklistGate, GateVerdict};
pub use config::{builtin_templates, EngineConfig, ResubmissionPolicy};
pub use event_bus::{EventBusStats, ReviewEventBus};
pub use orchestrator::{OverdueLevel, ReviewEngine};
pub use role_directory::{RoleDirectory, StaticRoleDirectory};
pub use state_machine::{DecisionOutcome, LevelVerdict, StateMachine};
pub use template_resolver::LevelTemplateResolver;
