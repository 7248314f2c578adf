//! Workflow engine: command and query surface over review storage
//!
//! Every command follows the same shape: read the workflow with its
//! [`Revision`](review_storage::Revision), compute the next state with the
//! [`StateMachine`], write it back conditionally together with its audit
//! entries, and only then broadcast events. A failed precondition or a lost
//! race leaves storage untouched.

use crate::audit_trail::{
    comment_entry, decision_entry, event_entries, event_entry, AuditTrail, ChainVerification,
};
use crate::config::{EngineConfig, ResubmissionPolicy};
use crate::event_bus::{EventBusStats, ReviewEventBus};
use crate::role_directory::{RoleDirectory, StaticRoleDirectory};
use crate::state_machine::{DecisionOutcome, LevelVerdict, StateMachine};
use crate::template_resolver::LevelTemplateResolver;
use chrono::{DateTime, Utc};
use review_storage::{
    AuditRecord, ChildRef, DecisionWrite, InMemoryReviewStorage, QueryWindow, ReviewStorage,
    Settlement, StorageError, StoredWorkflow,
};
use review_types::*;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// An in-progress level past its deadline
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverdueLevel {
    pub workflow_id: WorkflowId,
    pub version_id: VersionId,
    pub level_id: LevelId,
    pub level_number: u32,
    pub name: String,
    pub deadline: DateTime<Utc>,
}

/// The review workflow engine
pub struct ReviewEngine<S = InMemoryReviewStorage> {
    storage: Arc<S>,
    resolver: LevelTemplateResolver,
    roles: Arc<dyn RoleDirectory>,
    machine: StateMachine,
    audit: AuditTrail<S>,
    events: ReviewEventBus,
    config: EngineConfig,
}

impl ReviewEngine<InMemoryReviewStorage> {
    /// Engine over a fresh in-memory store
    pub fn in_memory(config: EngineConfig) -> ReviewResult<Self> {
        Self::new(Arc::new(InMemoryReviewStorage::new()), config)
    }
}

impl<S: ReviewStorage> ReviewEngine<S> {
    pub fn new(storage: Arc<S>, config: EngineConfig) -> ReviewResult<Self> {
        let resolver = LevelTemplateResolver::new(config.templates.clone())?;
        let roles: Arc<dyn RoleDirectory> =
            Arc::new(StaticRoleDirectory::from(config.roles.clone()));

        tracing::info!(
            templates = resolver.count(),
            roles = config.roles.len(),
            resubmission = ?config.resubmission,
            "Review engine initialised"
        );

        Ok(Self {
            audit: AuditTrail::new(storage.clone()),
            events: ReviewEventBus::new(config.event_channel_capacity),
            storage,
            resolver,
            roles,
            machine: StateMachine::new(),
            config,
        })
    }

    /// Resolve roles through an external directory instead of configuration
    pub fn with_role_directory(mut self, roles: Arc<dyn RoleDirectory>) -> Self {
        self.roles = roles;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &LevelTemplateResolver {
        &self.resolver
    }

    // ── Deliverables and versions ────────────────────────────────────

    pub fn register_deliverable(
        &self,
        title: impl Into<String>,
        deliverable_type: impl Into<String>,
    ) -> ReviewResult<Deliverable> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ReviewError::InvalidInput(
                "deliverable title must not be empty".to_string(),
            ));
        }

        let deliverable = Deliverable::new(title, deliverable_type);
        self.storage.register_deliverable(deliverable.clone())?;
        tracing::info!(deliverable_id = %deliverable.id, title = %deliverable.title, "Deliverable registered");
        Ok(deliverable)
    }

    pub fn get_deliverable(&self, deliverable_id: &DeliverableId) -> ReviewResult<Deliverable> {
        self.storage
            .get_deliverable(deliverable_id)?
            .ok_or_else(|| ReviewError::DeliverableNotFound(deliverable_id.clone()))
    }

    /// Store a new immutable version, numbered one past the latest
    pub fn create_version(
        &self,
        deliverable_id: &DeliverableId,
        file_url: impl Into<String>,
        change_log: impl Into<String>,
    ) -> ReviewResult<Version> {
        let file_url = file_url.into();
        if file_url.trim().is_empty() {
            return Err(ReviewError::InvalidInput(
                "version file url must not be empty".to_string(),
            ));
        }
        self.get_deliverable(deliverable_id)?;

        let version =
            self.storage
                .create_version(deliverable_id, file_url, change_log.into(), Utc::now())?;
        tracing::info!(
            deliverable_id = %deliverable_id,
            version_id = %version.id,
            version = version.version_number,
            "Version created"
        );
        Ok(version)
    }

    pub fn get_version(&self, version_id: &VersionId) -> ReviewResult<Version> {
        self.storage
            .get_version(version_id)?
            .ok_or_else(|| ReviewError::VersionNotFound(version_id.clone()))
    }

    pub fn list_versions(&self, deliverable_id: &DeliverableId) -> ReviewResult<Vec<Version>> {
        self.get_deliverable(deliverable_id)?;
        Ok(self.storage.list_versions(deliverable_id)?)
    }

    pub fn latest_version(&self, deliverable_id: &DeliverableId) -> ReviewResult<Option<Version>> {
        self.get_deliverable(deliverable_id)?;
        Ok(self.storage.latest_version(deliverable_id)?)
    }

    // ── Workflow commands ────────────────────────────────────────────

    /// Instantiate a draft workflow for a version from its type's template
    pub fn create_workflow(
        &self,
        version_id: &VersionId,
        workflow_type: &str,
    ) -> ReviewResult<Workflow> {
        let template = self.resolver.template(workflow_type)?;
        let version = self.get_version(version_id)?;
        if let Some(existing) = self.storage.active_workflow_for_version(version_id)? {
            return Err(ReviewError::VersionAlreadyHasActiveWorkflow {
                version_id: version_id.clone(),
                workflow_id: existing,
            });
        }

        let now = Utc::now();
        let levels = self
            .machine
            .instantiate_levels(&template.levels, self.roles.as_ref())?;
        let mut workflow = Workflow::new(
            version.id.clone(),
            version.deliverable_id.clone(),
            workflow_type,
            levels,
        )
        .with_reentry(template.reentry);
        if !template.checklist.is_empty() {
            let mut checklist = Checklist::from_definitions(template.checklist.clone());
            self.machine.gate().evaluate(&mut checklist, now);
            workflow = workflow.with_checklist(checklist);
        }

        let created = ReviewEvent::WorkflowCreated {
            workflow_id: workflow.id.clone(),
            version_id: version_id.clone(),
            workflow_type: workflow_type.to_string(),
        };
        let audit = vec![event_entry(&created, &self.config.system_actor)?];
        let stored = self.storage.insert_workflow(workflow, audit).map_err(|e| match e {
            StorageError::Duplicate { existing, .. } => {
                ReviewError::VersionAlreadyHasActiveWorkflow {
                    version_id: version_id.clone(),
                    workflow_id: WorkflowId::new(existing),
                }
            }
            other => other.into(),
        })?;

        tracing::info!(
            workflow_id = %stored.workflow.id,
            version_id = %version_id,
            workflow_type,
            levels = stored.workflow.levels.len(),
            "Workflow created"
        );
        self.broadcast(vec![created]);
        Ok(stored.workflow)
    }

    pub fn start_review(&self, workflow_id: &WorkflowId) -> ReviewResult<Workflow> {
        self.transition(workflow_id, &self.config.system_actor, |machine, wf, now| {
            machine.start_review(wf, now)
        })
    }

    /// Record one approver's decision and settle the level if it is decided.
    ///
    /// The decision and the level settlement it causes are one storage
    /// write. It only conflicts with aggregate transitions, so approvers on
    /// the same level may decide concurrently. The loser of a race re-reads
    /// and either finds the level already settled (`Superseded`) or writes
    /// again. Giving up leaves nothing behind.
    pub fn record_approver_decision(
        &self,
        workflow_id: &WorkflowId,
        level_id: &LevelId,
        approver_id: &ApproverId,
        decision: Decision,
        comment: Option<String>,
    ) -> ReviewResult<DecisionOutcome> {
        let comment = comment.filter(|c| !c.trim().is_empty());

        let mut attempts = 0;
        loop {
            let stored = self.load(workflow_id)?;
            if attempts > 0 {
                if let Some(outcome) = superseded(&stored.workflow, level_id) {
                    tracing::debug!(
                        workflow_id = %workflow_id,
                        status = %stored.workflow.status,
                        "Level already settled by a concurrent call"
                    );
                    return Ok(outcome);
                }
            }
            let (level_number, approver_name) = self
                .machine
                .validate_decision(&stored.workflow, level_id, approver_id)
                .map_err(|e| {
                    tracing::warn!(
                        workflow_id = %workflow_id,
                        approver = %approver_id,
                        error = %e,
                        "Decision refused"
                    );
                    e
                })?;

            let record = DecisionRecord {
                round: stored.workflow.revision_round,
                level_number,
                approver_id: approver_id.clone(),
                approver_name: approver_name.clone(),
                decision,
                comment: comment.clone(),
                decided_at: Utc::now(),
            };
            let write = DecisionWrite {
                level_id: level_id.clone(),
                record: record.clone(),
            };

            let mut settled = None;
            let mut settle = |wf: &mut Workflow| -> ReviewResult<Settlement> {
                let level = wf
                    .level_by_id(level_id)
                    .ok_or_else(|| ReviewError::LevelNotFound(level_id.clone()))?;
                let verdict = self.machine.settle(level);
                let mut audit = vec![decision_entry(workflow_id, level_id, &record)?];
                if verdict == LevelVerdict::Open {
                    settled = Some((verdict, DecisionOutcome::Recorded { level_number }, Vec::new()));
                    return Ok(Settlement {
                        transitioned: false,
                        audit,
                    });
                }
                let (outcome, events) =
                    self.machine
                        .apply_verdict(wf, level_number, verdict, record.decided_at)?;
                audit.extend(event_entries(&events, &approver_name)?);
                settled = Some((verdict, outcome, events));
                Ok(Settlement {
                    transitioned: true,
                    audit,
                })
            };

            match self
                .storage
                .record_decision(workflow_id, stored.revision.state, write, &mut settle)
            {
                Ok(_) => {
                    let Some((verdict, outcome, events)) = settled else {
                        return Err(ReviewError::Storage(
                            "decision stored without settling its level".to_string(),
                        ));
                    };
                    tracing::info!(
                        workflow_id = %workflow_id,
                        level = level_number,
                        approver = %approver_id,
                        decision = ?decision,
                        round = record.round,
                        verdict = ?verdict,
                        "Approver decision recorded"
                    );
                    self.broadcast(events);
                    return Ok(outcome);
                }
                Err(StorageError::Conflict {
                    entity,
                    expected,
                    found,
                }) => {
                    if attempts >= self.config.max_reevaluations {
                        tracing::warn!(workflow_id = %workflow_id, level = level_number, "Decision write gave up");
                        return Err(ReviewError::ConcurrentModification {
                            entity,
                            expected,
                            found,
                        });
                    }
                    attempts += 1;
                    tracing::debug!(workflow_id = %workflow_id, attempt = attempts, "Decision write conflicted, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// `revision_requested -> in_review`. With `new_version` the workflow
    /// moves onto a newer version of the same deliverable.
    pub fn resubmit_after_revision(
        &self,
        workflow_id: &WorkflowId,
        new_version: Option<&VersionId>,
    ) -> ReviewResult<Workflow> {
        let stored = self.load(workflow_id)?;
        stored.workflow.ensure_not_terminal()?;
        stored
            .workflow
            .ensure_status(WorkflowStatus::RevisionRequested)?;
        let rebind = self.resubmission_target(&stored.workflow, new_version)?;

        self.commit(stored, &self.config.system_actor, |machine, wf, now| {
            machine.resubmit(wf, rebind, now)
        })
        .map_err(|e| match e {
            ReviewError::Storage(message) if new_version.is_some() => {
                ReviewError::ResubmissionRejected(message)
            }
            other => other,
        })
    }

    fn resubmission_target(
        &self,
        workflow: &Workflow,
        new_version: Option<&VersionId>,
    ) -> ReviewResult<Option<VersionId>> {
        let Some(version_id) = new_version.filter(|v| **v != workflow.version_id) else {
            return match self.config.resubmission {
                ResubmissionPolicy::AllowSameVersion => Ok(None),
                ResubmissionPolicy::RequireNewVersion => {
                    Err(ReviewError::ResubmissionRejected(format!(
                        "workflow {} needs a new version of deliverable {}",
                        workflow.id, workflow.deliverable_id
                    )))
                }
            };
        };

        let candidate = self.get_version(version_id)?;
        let current = self.get_version(&workflow.version_id)?;
        if !candidate.supersedes(&current) {
            return Err(ReviewError::ResubmissionRejected(format!(
                "version {} (v{}) does not supersede v{} of deliverable {}",
                candidate.id,
                candidate.version_number,
                current.version_number,
                workflow.deliverable_id
            )));
        }
        if let Some(owner) = self.storage.active_workflow_for_version(version_id)? {
            if owner != workflow.id {
                return Err(ReviewError::VersionAlreadyHasActiveWorkflow {
                    version_id: version_id.clone(),
                    workflow_id: owner,
                });
            }
        }
        Ok(Some(version_id.clone()))
    }

    pub fn cancel_workflow(
        &self,
        workflow_id: &WorkflowId,
        reason: Option<String>,
    ) -> ReviewResult<Workflow> {
        let reason = reason.filter(|r| !r.trim().is_empty());
        self.transition(workflow_id, &self.config.system_actor, |machine, wf, now| {
            machine.cancel(wf, reason, now)
        })
    }

    /// Explicit final approval. Fails with `ChecklistIncomplete` while
    /// required checklist items have not passed.
    pub fn finalize_approval(&self, workflow_id: &WorkflowId) -> ReviewResult<Workflow> {
        self.transition(workflow_id, &self.config.system_actor, |machine, wf, now| {
            machine.finalize(wf, now)
        })
    }

    /// Append a comment to a level's thread and the audit trail
    pub fn add_comment(
        &self,
        level_id: &LevelId,
        comment_type: CommentType,
        content: impl Into<String>,
        author_name: impl Into<String>,
    ) -> ReviewResult<Comment> {
        let content = content.into();
        let author_name = author_name.into();
        if content.trim().is_empty() || author_name.trim().is_empty() {
            return Err(ReviewError::InvalidInput(
                "comments need content and an author".to_string(),
            ));
        }
        let workflow_id = self
            .storage
            .owner_of(&ChildRef::Level(level_id.clone()))?
            .ok_or_else(|| ReviewError::LevelNotFound(level_id.clone()))?;

        let mut attempts = 0;
        let comment = loop {
            let stored = self.load(&workflow_id)?;
            stored.workflow.ensure_not_terminal()?;

            let comment = Comment {
                id: CommentId::generate(),
                level_id: level_id.clone(),
                comment_type: comment_type.clone(),
                content: content.clone(),
                author_name: author_name.clone(),
                round: stored.workflow.revision_round,
                created_at: Utc::now(),
            };
            let audit = vec![comment_entry(&workflow_id, &comment)?];
            match self
                .storage
                .append_comment(&workflow_id, stored.revision.state, comment.clone(), audit)
            {
                Ok(_) => break comment,
                Err(StorageError::Conflict { .. }) if attempts < self.config.max_reevaluations => {
                    attempts += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::debug!(workflow_id = %workflow_id, comment_id = %comment.id, "Comment added");
        self.events.publish(ReviewEvent::CommentAdded {
            workflow_id,
            level_id: level_id.clone(),
            comment_id: comment.id.clone(),
        });
        Ok(comment)
    }

    // ── Checklist commands ───────────────────────────────────────────

    pub fn attach_checklist(
        &self,
        workflow_id: &WorkflowId,
        items: Vec<ChecklistItemDefinition>,
    ) -> ReviewResult<Workflow> {
        self.transition(workflow_id, &self.config.system_actor, |machine, wf, now| {
            machine.attach_checklist(wf, items, now)
        })
    }

    /// Update one checklist item. Approves the workflow when this was all
    /// that was holding it back.
    pub fn set_checklist_item_status(
        &self,
        item_id: &ChecklistItemId,
        status: ChecklistItemStatus,
        checked_by: &str,
    ) -> ReviewResult<Checklist> {
        let workflow_id = self
            .storage
            .owner_of(&ChildRef::ChecklistItem(item_id.clone()))?
            .ok_or_else(|| ReviewError::ChecklistItemNotFound(item_id.clone()))?;

        let workflow = self.transition(&workflow_id, checked_by, |machine, wf, now| {
            machine.set_checklist_item(wf, item_id, status, checked_by, now)
        })?;
        workflow
            .checklist
            .ok_or_else(|| ReviewError::ChecklistItemNotFound(item_id.clone()))
    }

    pub fn evaluate_checklist(&self, checklist_id: &ChecklistId) -> ReviewResult<Checklist> {
        let workflow_id = self
            .storage
            .owner_of(&ChildRef::Checklist(checklist_id.clone()))?
            .ok_or_else(|| ReviewError::ChecklistNotFound(checklist_id.clone()))?;

        let workflow = self.transition(&workflow_id, &self.config.system_actor, |machine, wf, now| {
            machine.evaluate_checklist(wf, now)
        })?;
        workflow
            .checklist
            .ok_or_else(|| ReviewError::ChecklistNotFound(checklist_id.clone()))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Full nested state of the workflow bound to a version: the active
    /// one if any, else the most recent.
    pub fn get_workflow(&self, version_id: &VersionId) -> ReviewResult<Workflow> {
        let workflow_id = match self.storage.active_workflow_for_version(version_id)? {
            Some(id) => id,
            None => self
                .storage
                .workflows_for_version(version_id)?
                .pop()
                .ok_or_else(|| ReviewError::NoWorkflowForVersion(version_id.clone()))?,
        };
        self.get_workflow_by_id(&workflow_id)
    }

    pub fn get_workflow_by_id(&self, workflow_id: &WorkflowId) -> ReviewResult<Workflow> {
        Ok(self.load(workflow_id)?.workflow)
    }

    pub fn list_active_workflows(&self, window: QueryWindow) -> ReviewResult<Vec<Workflow>> {
        Ok(self
            .storage
            .list_active(window)?
            .into_iter()
            .map(|s| s.workflow)
            .collect())
    }

    /// Ordered history of a workflow
    pub fn get_audit_trail(&self, workflow_id: &WorkflowId) -> ReviewResult<Vec<AuditRecord>> {
        self.load(workflow_id)?;
        self.audit.query(workflow_id)
    }

    pub fn verify_audit_chain(&self, workflow_id: &WorkflowId) -> ReviewResult<ChainVerification> {
        self.load(workflow_id)?;
        self.audit.verify_chain(workflow_id)
    }

    /// In-progress levels past their deadline across workflows in review.
    /// A level reopened for revision waits on the resubmission, not on its
    /// approvers.
    pub fn overdue_levels(&self, now: DateTime<Utc>) -> ReviewResult<Vec<OverdueLevel>> {
        let active = self.storage.list_active(QueryWindow::all())?;
        Ok(active
            .iter()
            .filter(|stored| stored.workflow.status == WorkflowStatus::InReview)
            .flat_map(|stored| {
                let workflow = &stored.workflow;
                workflow
                    .levels
                    .iter()
                    .filter(move |l| l.is_overdue(now))
                    .filter_map(move |l| {
                        l.deadline.map(|deadline| OverdueLevel {
                            workflow_id: workflow.id.clone(),
                            version_id: workflow.version_id.clone(),
                            level_id: l.id.clone(),
                            level_number: l.level_number,
                            name: l.name.clone(),
                            deadline,
                        })
                    })
            })
            .collect())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEventEnvelope> {
        self.events.subscribe()
    }

    pub fn event_stats(&self) -> EventBusStats {
        self.events.stats()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn load(&self, workflow_id: &WorkflowId) -> ReviewResult<StoredWorkflow> {
        self.storage
            .get_workflow(workflow_id)?
            .ok_or_else(|| ReviewError::WorkflowNotFound(workflow_id.clone()))
    }

    fn transition<F>(&self, workflow_id: &WorkflowId, actor: &str, apply: F) -> ReviewResult<Workflow>
    where
        F: FnOnce(&StateMachine, &mut Workflow, DateTime<Utc>) -> ReviewResult<Vec<ReviewEvent>>,
    {
        let stored = self.load(workflow_id)?;
        self.commit(stored, actor, apply)
    }

    /// Apply a transition to a snapshot and write it back if nothing moved
    /// in between. Never retried: the caller re-reads on conflict.
    fn commit<F>(&self, stored: StoredWorkflow, actor: &str, apply: F) -> ReviewResult<Workflow>
    where
        F: FnOnce(&StateMachine, &mut Workflow, DateTime<Utc>) -> ReviewResult<Vec<ReviewEvent>>,
    {
        let workflow_id = stored.workflow.id.clone();
        let mut next = stored.workflow.clone();
        let events = apply(&self.machine, &mut next, Utc::now()).map_err(|e| {
            tracing::warn!(workflow_id = %workflow_id, error = %e, "Transition refused");
            e
        })?;

        let audit = event_entries(&events, actor)?;
        let committed = self
            .storage
            .compare_and_swap(&workflow_id, stored.revision, next, audit)?;
        tracing::info!(
            workflow_id = %workflow_id,
            status = %committed.workflow.status,
            level = committed.workflow.current_level,
            round = committed.workflow.revision_round,
            "Workflow transition committed"
        );
        self.broadcast(events);
        Ok(committed.workflow)
    }

    /// Fan out committed events. Subscribers see them in broadcast order,
    /// which may interleave across concurrent commands; the audit trail
    /// holds the commit order.
    fn broadcast(&self, events: Vec<ReviewEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}

/// Outcome for a decision that lost its race to a call which already
/// moved the level or the workflow on.
fn superseded(workflow: &Workflow, level_id: &LevelId) -> Option<DecisionOutcome> {
    let level = workflow.level_by_id(level_id)?;
    if workflow.status == WorkflowStatus::InReview && level.status == LevelStatus::InProgress {
        return None;
    }
    Some(DecisionOutcome::Superseded {
        status: workflow.status,
        current_level: workflow.current_level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ReviewEngine {
        let config = EngineConfig::default()
            .with_role("team-lead", vec![ApproverIdentity::new("u-lead", "Lee")])
            .with_role(
                "account-manager",
                vec![ApproverIdentity::new("u-am", "Alex")],
            );
        ReviewEngine::in_memory(config).unwrap()
    }

    fn version(engine: &ReviewEngine) -> Version {
        let deliverable = engine.register_deliverable("Spring campaign", "video").unwrap();
        engine
            .create_version(&deliverable.id, "s3://deliverables/spring-v1.mp4", "first cut")
            .unwrap()
    }

    #[test]
    fn test_create_workflow_from_template() {
        let engine = engine();
        let version = version(&engine);
        let workflow = engine.create_workflow(&version.id, "standard").unwrap();

        assert_eq!(workflow.status, WorkflowStatus::Draft);
        assert_eq!(workflow.current_level, 1);
        assert_eq!(workflow.revision_round, 1);
        assert_eq!(workflow.levels.len(), 2);
        assert_eq!(workflow.checklist.as_ref().map(|c| c.items.len()), Some(3));
        assert_eq!(engine.get_workflow(&version.id).unwrap().id, workflow.id);
    }

    #[test]
    fn test_create_workflow_errors() {
        let engine = engine();
        let version = version(&engine);

        assert!(matches!(
            engine.create_workflow(&version.id, "nope"),
            Err(ReviewError::UnknownWorkflowType(_))
        ));
        assert!(matches!(
            engine.create_workflow(&VersionId::new("missing"), "express"),
            Err(ReviewError::VersionNotFound(_))
        ));
        // no reviewers configured for this template
        assert!(matches!(
            engine.create_workflow(&version.id, "regulated"),
            Err(ReviewError::InvalidTemplate(_))
        ));

        let first = engine.create_workflow(&version.id, "express").unwrap();
        match engine.create_workflow(&version.id, "express") {
            Err(ReviewError::VersionAlreadyHasActiveWorkflow { workflow_id, .. }) => {
                assert_eq!(workflow_id, first.id)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_workflow_frees_version() {
        let engine = engine();
        let version = version(&engine);
        let first = engine.create_workflow(&version.id, "express").unwrap();
        engine
            .cancel_workflow(&first.id, Some("wrong brief".into()))
            .unwrap();

        let second = engine.create_workflow(&version.id, "express").unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(engine.get_workflow(&version.id).unwrap().id, second.id);
    }

    #[test]
    fn test_version_numbering() {
        let engine = engine();
        let deliverable = engine.register_deliverable("Logo", "image").unwrap();
        let v1 = engine.create_version(&deliverable.id, "s3://a", "").unwrap();
        let v2 = engine.create_version(&deliverable.id, "s3://b", "tweak").unwrap();
        assert_eq!((v1.version_number, v2.version_number), (1, 2));
        assert_eq!(
            engine.latest_version(&deliverable.id).unwrap().map(|v| v.id),
            Some(v2.id)
        );
        assert!(matches!(
            engine.create_version(&DeliverableId::new("ghost"), "s3://c", ""),
            Err(ReviewError::DeliverableNotFound(_))
        ));
        assert!(matches!(
            engine.create_version(&deliverable.id, " ", ""),
            Err(ReviewError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_express_review_records_audit_and_events() {
        let engine = engine();
        let mut events = engine.subscribe();
        let version = version(&engine);
        let workflow = engine.create_workflow(&version.id, "express").unwrap();
        engine.start_review(&workflow.id).unwrap();

        let level_id = workflow.levels[0].id.clone();
        let outcome = engine
            .record_approver_decision(
                &workflow.id,
                &level_id,
                &ApproverId::new("u-lead"),
                Decision::Approve,
                Some("ship it".into()),
            )
            .unwrap();
        assert_eq!(outcome, DecisionOutcome::WorkflowApproved);

        let trail = engine.get_audit_trail(&workflow.id).unwrap();
        let actions: Vec<_> = trail.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(
            actions,
            vec![
                "workflow.created",
                "workflow.review_started",
                "level.activated",
                "approver.approved",
                "level.approved",
                "workflow.approved",
            ]
        );
        assert!(engine.verify_audit_chain(&workflow.id).unwrap().intact);

        let mut names = Vec::new();
        while let Ok(envelope) = events.try_recv() {
            names.push(envelope.event.name());
        }
        assert_eq!(names.last(), Some(&"workflow.approved"));
        assert_eq!(engine.event_stats().published, 5);
    }

    #[test]
    fn test_overdue_levels() {
        let engine = engine();
        let version = version(&engine);
        let workflow = engine.create_workflow(&version.id, "express").unwrap();
        engine.start_review(&workflow.id).unwrap();

        assert!(engine.overdue_levels(Utc::now()).unwrap().is_empty());
        let later = Utc::now() + chrono::Duration::hours(25);
        let overdue = engine.overdue_levels(later).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].name, "Lead Sign-off");
        assert_eq!(overdue[0].workflow_id, workflow.id);
    }
}
