//! Storage contracts for deliverable review.
//!
//! This crate defines what the review engine needs from persistence:
//! - deliverables and immutable, sequentially numbered versions
//! - workflow records written under optimistic concurrency
//! - a per-workflow, hash-chained, append-only audit log
//!
//! Workflow writes come in two strengths. Aggregate transitions replace the
//! whole record with a compare-and-swap on its [`Revision`]. Approver
//! decisions and comments are conditional row writes that only require the
//! aggregate to be unchanged, so approvers on one level never block each
//! other. A decision settles its level inside the same write. Every write
//! carries its audit entries.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryReviewStorage;
pub use model::{
    AuditAppend, AuditKind, AuditRecord, ChildRef, DecisionWrite, Revision, Settlement,
    StoredWorkflow,
};
pub use traits::{AuditStore, QueryWindow, ReviewStorage, VersionStore, WorkflowStore};
