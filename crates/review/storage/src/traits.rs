use crate::model::{
    AuditAppend, AuditRecord, ChildRef, DecisionWrite, Revision, Settlement, StoredWorkflow,
};
use crate::StorageResult;
use chrono::{DateTime, Utc};
use review_types::{
    Comment, Deliverable, DeliverableId, ReviewResult, Version, VersionId, Workflow, WorkflowId,
};

/// Paging controls for list operations. `limit == 0` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }
}

/// Deliverables and their immutable versions.
pub trait VersionStore: Send + Sync {
    fn register_deliverable(&self, deliverable: Deliverable) -> StorageResult<()>;

    fn get_deliverable(&self, id: &DeliverableId) -> StorageResult<Option<Deliverable>>;

    /// Store a new version numbered one past the deliverable's latest.
    fn create_version(
        &self,
        deliverable_id: &DeliverableId,
        file_url: String,
        change_log: String,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Version>;

    fn get_version(&self, id: &VersionId) -> StorageResult<Option<Version>>;

    /// Versions of a deliverable, oldest first.
    fn list_versions(&self, deliverable_id: &DeliverableId) -> StorageResult<Vec<Version>>;

    fn latest_version(&self, deliverable_id: &DeliverableId) -> StorageResult<Option<Version>>;
}

/// Workflow records under optimistic concurrency.
///
/// Every read hands back a [`Revision`]. Writes are conditional on it, and
/// each write chains its `audit` entries to the workflow's trail before the
/// record becomes visible, so trail order is commit order. A write either
/// lands with all of its entries or not at all.
pub trait WorkflowStore: Send + Sync {
    /// Insert a new workflow. Fails with `Duplicate` when its version
    /// already has a non-terminal workflow.
    fn insert_workflow(
        &self,
        workflow: Workflow,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow>;

    fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Option<StoredWorkflow>>;

    fn active_workflow_for_version(&self, version_id: &VersionId)
        -> StorageResult<Option<WorkflowId>>;

    /// Every workflow ever bound to a version, oldest first.
    fn workflows_for_version(&self, version_id: &VersionId) -> StorageResult<Vec<WorkflowId>>;

    /// Resolve a level, checklist or checklist item to its workflow.
    fn owner_of(&self, child: &ChildRef) -> StorageResult<Option<WorkflowId>>;

    /// Replace the workflow if both revision counters still match.
    fn compare_and_swap(
        &self,
        id: &WorkflowId,
        expected: Revision,
        next: Workflow,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow>;

    /// Write one approver decision, then let `settle` fold it into the
    /// level while the record is still held. Succeeds alongside concurrent
    /// decisions on other slots as long as no aggregate transition happened
    /// since `expected_state` and the slot is still pending. An error from
    /// `settle` discards the decision.
    fn record_decision(
        &self,
        id: &WorkflowId,
        expected_state: u64,
        write: DecisionWrite,
        settle: &mut dyn FnMut(&mut Workflow) -> ReviewResult<Settlement>,
    ) -> StorageResult<StoredWorkflow>;

    /// Append a comment to a level thread under the same rule.
    fn append_comment(
        &self,
        id: &WorkflowId,
        expected_state: u64,
        comment: Comment,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow>;

    /// Non-terminal workflows, oldest first.
    fn list_active(&self, window: QueryWindow) -> StorageResult<Vec<StoredWorkflow>>;
}

/// Storage interface for append-only audit events.
pub trait AuditStore: Send + Sync {
    /// Append an event and return the canonical, hash-linked stored record.
    fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord>;

    /// Read a workflow's events in sequence order.
    fn list_audit(&self, workflow_id: &WorkflowId, window: QueryWindow)
        -> StorageResult<Vec<AuditRecord>>;

    /// Get the latest audit hash anchor of a workflow.
    fn latest_audit_hash(&self, workflow_id: &WorkflowId) -> StorageResult<Option<String>>;
}

/// Unified storage bundle used by the review engine.
pub trait ReviewStorage: VersionStore + WorkflowStore + AuditStore + Send + Sync {}

impl<T> ReviewStorage for T where T: VersionStore + WorkflowStore + AuditStore + Send + Sync {}
