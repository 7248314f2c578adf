//! In-memory reference implementation of the review storage traits.
//!
//! Each workflow record is its own unit of locking: conditional writes hold
//! only the map shard of the workflow they touch. Production deployments
//! would back the same contracts with a transactional store.

use crate::model::{
    AuditAppend, AuditRecord, ChildRef, DecisionWrite, Revision, Settlement, StoredWorkflow,
};
use crate::traits::{AuditStore, QueryWindow, VersionStore, WorkflowStore};
use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use review_types::{
    Comment, Deliverable, DeliverableId, LevelStatus, ReviewResult, Version, VersionId, Workflow,
    WorkflowId,
};

/// In-memory review storage adapter.
#[derive(Default)]
pub struct InMemoryReviewStorage {
    deliverables: DashMap<DeliverableId, Deliverable>,
    versions: DashMap<VersionId, Version>,
    deliverable_versions: DashMap<DeliverableId, Vec<VersionId>>,
    workflows: DashMap<WorkflowId, StoredWorkflow>,
    active: DashMap<VersionId, WorkflowId>,
    by_version: DashMap<VersionId, Vec<WorkflowId>>,
    children: DashMap<ChildRef, WorkflowId>,
    audits: DashMap<WorkflowId, Vec<AuditRecord>>,
}

impl InMemoryReviewStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_children(&self, workflow: &Workflow) {
        for level in &workflow.levels {
            self.children
                .insert(ChildRef::Level(level.id.clone()), workflow.id.clone());
        }
        if let Some(checklist) = &workflow.checklist {
            self.children
                .insert(ChildRef::Checklist(checklist.id.clone()), workflow.id.clone());
            for item in &checklist.items {
                self.children
                    .insert(ChildRef::ChecklistItem(item.id.clone()), workflow.id.clone());
            }
        }
    }
}

// ── Versions ─────────────────────────────────────────────────────────

impl VersionStore for InMemoryReviewStorage {
    fn register_deliverable(&self, deliverable: Deliverable) -> StorageResult<()> {
        match self.deliverables.entry(deliverable.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate {
                entity: format!("deliverable {}", deliverable.id),
                existing: deliverable.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(deliverable);
                Ok(())
            }
        }
    }

    fn get_deliverable(&self, id: &DeliverableId) -> StorageResult<Option<Deliverable>> {
        Ok(self.deliverables.get(id).map(|d| d.clone()))
    }

    fn create_version(
        &self,
        deliverable_id: &DeliverableId,
        file_url: String,
        change_log: String,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Version> {
        if !self.deliverables.contains_key(deliverable_id) {
            return Err(StorageError::NotFound(format!(
                "deliverable {deliverable_id} not found"
            )));
        }

        // The entry guard serialises numbering per deliverable.
        let mut ids = self
            .deliverable_versions
            .entry(deliverable_id.clone())
            .or_default();
        let version = Version {
            id: VersionId::generate(),
            deliverable_id: deliverable_id.clone(),
            version_number: ids.len() as u32 + 1,
            file_url,
            change_log,
            created_at,
        };
        ids.push(version.id.clone());
        self.versions.insert(version.id.clone(), version.clone());
        Ok(version)
    }

    fn get_version(&self, id: &VersionId) -> StorageResult<Option<Version>> {
        Ok(self.versions.get(id).map(|v| v.clone()))
    }

    fn list_versions(&self, deliverable_id: &DeliverableId) -> StorageResult<Vec<Version>> {
        let ids = match self.deliverable_versions.get(deliverable_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.versions.get(id).map(|v| v.clone()))
            .collect())
    }

    fn latest_version(&self, deliverable_id: &DeliverableId) -> StorageResult<Option<Version>> {
        let latest = self
            .deliverable_versions
            .get(deliverable_id)
            .and_then(|ids| ids.last().cloned());
        Ok(latest.and_then(|id| self.versions.get(&id).map(|v| v.clone())))
    }
}

// ── Workflows ────────────────────────────────────────────────────────

impl WorkflowStore for InMemoryReviewStorage {
    fn insert_workflow(
        &self,
        workflow: Workflow,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow> {
        if workflow.status.is_terminal() {
            return Err(StorageError::InvariantViolation(format!(
                "workflow {} inserted in terminal status {}",
                workflow.id, workflow.status
            )));
        }

        let id = workflow.id.clone();
        let version_id = workflow.version_id.clone();
        if self.audits.contains_key(&id) {
            return Err(StorageError::Duplicate {
                entity: format!("audit trail of workflow {id}"),
                existing: id.to_string(),
            });
        }
        let sealed = seal_audit(&id, &[], audit)?;
        let stored = StoredWorkflow {
            workflow,
            revision: Revision::default(),
        };

        match self.workflows.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::Duplicate {
                    entity: format!("workflow {id}"),
                    existing: id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(stored.clone());
            }
        }

        // The record is invisible until indexed, so claiming the version
        // afterwards never nests the two map locks.
        match self.active.entry(version_id.clone()) {
            Entry::Occupied(owner) => {
                let existing = owner.get().to_string();
                drop(owner);
                self.workflows.remove(&id);
                return Err(StorageError::Duplicate {
                    entity: format!("active workflow for version {version_id}"),
                    existing,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        self.audits.insert(id.clone(), sealed);
        self.by_version.entry(version_id).or_default().push(id);
        self.index_children(&stored.workflow);
        Ok(stored)
    }

    fn get_workflow(&self, id: &WorkflowId) -> StorageResult<Option<StoredWorkflow>> {
        Ok(self.workflows.get(id).map(|w| w.clone()))
    }

    fn active_workflow_for_version(
        &self,
        version_id: &VersionId,
    ) -> StorageResult<Option<WorkflowId>> {
        Ok(self.active.get(version_id).map(|id| id.clone()))
    }

    fn workflows_for_version(&self, version_id: &VersionId) -> StorageResult<Vec<WorkflowId>> {
        Ok(self
            .by_version
            .get(version_id)
            .map(|ids| ids.clone())
            .unwrap_or_default())
    }

    fn owner_of(&self, child: &ChildRef) -> StorageResult<Option<WorkflowId>> {
        Ok(self.children.get(child).map(|id| id.clone()))
    }

    fn compare_and_swap(
        &self,
        id: &WorkflowId,
        expected: Revision,
        next: Workflow,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow> {
        if &next.id != id {
            return Err(StorageError::InvariantViolation(format!(
                "cannot replace workflow {id} with {}",
                next.id
            )));
        }

        // Lock order: workflow record, then its audit chain, then indexes.
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("workflow {id} not found")))?;

        if entry.revision != expected {
            tracing::debug!(
                workflow_id = %id,
                expected = %expected,
                found = %entry.revision,
                "workflow compare-and-swap lost"
            );
            return Err(StorageError::Conflict {
                entity: format!("workflow {id}"),
                expected: expected.to_string(),
                found: entry.revision.to_string(),
            });
        }

        let mut chain = self.audits.entry(id.clone()).or_default();
        let sealed = seal_audit(id, chain.as_slice(), audit)?;

        let previous_version = entry.workflow.version_id.clone();
        if next.version_id != previous_version {
            match self.active.entry(next.version_id.clone()) {
                Entry::Occupied(owner) if owner.get() != id => {
                    return Err(StorageError::Duplicate {
                        entity: format!("active workflow for version {}", next.version_id),
                        existing: owner.get().to_string(),
                    });
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                }
            }
            self.active
                .remove_if(&previous_version, |_, owner| owner == id);
            self.by_version
                .entry(next.version_id.clone())
                .or_default()
                .push(id.clone());
        }
        if next.status.is_terminal() {
            self.active.remove_if(&next.version_id, |_, owner| owner == id);
        }
        self.index_children(&next);

        entry.workflow = next;
        entry.revision = expected.next_state();
        chain.extend(sealed);
        Ok(entry.clone())
    }

    fn record_decision(
        &self,
        id: &WorkflowId,
        expected_state: u64,
        write: DecisionWrite,
        settle: &mut dyn FnMut(&mut Workflow) -> ReviewResult<Settlement>,
    ) -> StorageResult<StoredWorkflow> {
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("workflow {id} not found")))?;

        if entry.revision.state != expected_state {
            return Err(StorageError::Conflict {
                entity: format!("workflow {id}"),
                expected: format!("state {expected_state}"),
                found: format!("state {}", entry.revision.state),
            });
        }

        // Work on a copy: nothing is kept unless the level settles cleanly.
        let mut next = entry.workflow.clone();
        let decided_at = write.record.decided_at;
        {
            let level = next.level_by_id_mut(&write.level_id).ok_or_else(|| {
                StorageError::NotFound(format!("level {} not found", write.level_id))
            })?;

            if level.status != LevelStatus::InProgress {
                return Err(StorageError::InvariantViolation(format!(
                    "level {} is {}",
                    level.level_number, level.status
                )));
            }
            let slot = level.approver(&write.record.approver_id).ok_or_else(|| {
                StorageError::NotFound(format!(
                    "approver {} on level {}",
                    write.record.approver_id, level.level_number
                ))
            })?;
            if !slot.is_pending() {
                return Err(StorageError::Conflict {
                    entity: format!("approver {} on level {}", slot.id, level.level_number),
                    expected: "pending".to_string(),
                    found: slot.status.as_str().to_string(),
                });
            }

            level
                .apply_decision(write.record)
                .map_err(|e| StorageError::InvariantViolation(e.to_string()))?;
        }
        next.touch(decided_at);

        let settlement = settle(&mut next).map_err(StorageError::Refused)?;
        let mut chain = self.audits.entry(id.clone()).or_default();
        let sealed = seal_audit(id, chain.as_slice(), settlement.audit)?;

        if next.status.is_terminal() {
            self.active.remove_if(&next.version_id, |_, owner| owner == id);
        }
        let mut revision = entry.revision.next_entry();
        if settlement.transitioned {
            revision = revision.next_state();
        }
        entry.workflow = next;
        entry.revision = revision;
        chain.extend(sealed);
        Ok(entry.clone())
    }

    fn append_comment(
        &self,
        id: &WorkflowId,
        expected_state: u64,
        comment: Comment,
        audit: Vec<AuditAppend>,
    ) -> StorageResult<StoredWorkflow> {
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("workflow {id} not found")))?;

        if entry.revision.state != expected_state {
            return Err(StorageError::Conflict {
                entity: format!("workflow {id}"),
                expected: format!("state {expected_state}"),
                found: format!("state {}", entry.revision.state),
            });
        }
        if entry.workflow.level_by_id(&comment.level_id).is_none() {
            return Err(StorageError::NotFound(format!(
                "level {} not found",
                comment.level_id
            )));
        }

        let mut chain = self.audits.entry(id.clone()).or_default();
        let sealed = seal_audit(id, chain.as_slice(), audit)?;

        let stored = &mut *entry;
        let created_at = comment.created_at;
        if let Some(level) = stored.workflow.level_by_id_mut(&comment.level_id) {
            level.comments.push(comment);
        }
        stored.workflow.touch(created_at);
        stored.revision = stored.revision.next_entry();
        chain.extend(sealed);
        Ok(stored.clone())
    }

    fn list_active(&self, window: QueryWindow) -> StorageResult<Vec<StoredWorkflow>> {
        let mut values: Vec<StoredWorkflow> = self
            .workflows
            .iter()
            .filter(|w| !w.workflow.status.is_terminal())
            .map(|w| w.clone())
            .collect();
        values.sort_by(|a, b| a.workflow.created_at.cmp(&b.workflow.created_at));
        Ok(apply_window(values, window))
    }
}

// ── Audit ────────────────────────────────────────────────────────────

impl AuditStore for InMemoryReviewStorage {
    fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditRecord> {
        let mut chain = self.audits.entry(event.workflow_id.clone()).or_default();

        let previous_hash = chain.last().map(|e| e.hash.clone());
        let sequence = chain.len() as u64 + 1;
        let record = AuditRecord::sealed(event, sequence, previous_hash)?;

        chain.push(record.clone());
        Ok(record)
    }

    fn list_audit(
        &self,
        workflow_id: &WorkflowId,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditRecord>> {
        let values = self
            .audits
            .get(workflow_id)
            .map(|chain| chain.clone())
            .unwrap_or_default();
        Ok(apply_window(values, window))
    }

    fn latest_audit_hash(&self, workflow_id: &WorkflowId) -> StorageResult<Option<String>> {
        Ok(self
            .audits
            .get(workflow_id)
            .and_then(|chain| chain.last().map(|e| e.hash.clone())))
    }
}

/// Seal entries onto the end of a chain without touching it.
fn seal_audit(
    id: &WorkflowId,
    chain: &[AuditRecord],
    entries: Vec<AuditAppend>,
) -> StorageResult<Vec<AuditRecord>> {
    let mut previous_hash = chain.last().map(|r| r.hash.clone());
    let mut sealed = Vec::with_capacity(entries.len());
    for entry in entries {
        if &entry.workflow_id != id {
            return Err(StorageError::InvariantViolation(format!(
                "audit entry for workflow {} written with workflow {id}",
                entry.workflow_id
            )));
        }
        let sequence = (chain.len() + sealed.len()) as u64 + 1;
        let record = AuditRecord::sealed(entry, sequence, previous_hash.take())?;
        previous_hash = Some(record.hash.clone());
        sealed.push(record);
    }
    Ok(sealed)
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
