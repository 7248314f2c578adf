//! Audit/comment trail: append-only, hash-chained history per workflow

use review_storage::{AuditAppend, AuditKind, AuditRecord, AuditStore, QueryWindow};
use review_types::{
    Comment, Decision, DecisionRecord, LevelId, ReviewError, ReviewEvent, ReviewResult,
    WorkflowId,
};
use serde::Serialize;
use std::sync::Arc;

/// Result of re-walking a workflow's audit chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub workflow_id: WorkflowId,
    pub records: usize,
    pub intact: bool,
    /// Sequence number of the first record that does not link up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
}

/// Reads and verifies the audit trail.
///
/// Entries are written by the workflow store together with the change they
/// document; see [`event_entry`], [`decision_entry`] and [`comment_entry`].
pub struct AuditTrail<S> {
    store: Arc<S>,
}

impl<S: AuditStore> AuditTrail<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ordered history of a workflow
    pub fn query(&self, workflow_id: &WorkflowId) -> ReviewResult<Vec<AuditRecord>> {
        Ok(self.store.list_audit(workflow_id, QueryWindow::all())?)
    }

    pub fn verify_chain(&self, workflow_id: &WorkflowId) -> ReviewResult<ChainVerification> {
        let records = self.query(workflow_id)?;
        verify_records(workflow_id, &records)
    }
}

/// Entry for a transition or checklist event
pub fn event_entry(event: &ReviewEvent, actor: &str) -> ReviewResult<AuditAppend> {
    let kind = match event {
        ReviewEvent::ChecklistEvaluated { .. } => AuditKind::Checklist,
        ReviewEvent::CommentAdded { .. } => AuditKind::Comment,
        _ => AuditKind::Transition,
    };
    Ok(AuditAppend {
        workflow_id: event.workflow_id().clone(),
        level_id: event.level_id().cloned(),
        timestamp: chrono::Utc::now(),
        actor: actor.to_string(),
        kind,
        action: event.name().to_string(),
        message: describe(event),
        payload: to_payload(event)?,
    })
}

pub fn event_entries(events: &[ReviewEvent], actor: &str) -> ReviewResult<Vec<AuditAppend>> {
    events.iter().map(|e| event_entry(e, actor)).collect()
}

/// Entry for one approver decision
pub fn decision_entry(
    workflow_id: &WorkflowId,
    level_id: &LevelId,
    decision: &DecisionRecord,
) -> ReviewResult<AuditAppend> {
    let (action, verb) = match decision.decision {
        Decision::Approve => ("approver.approved", "approved"),
        Decision::Reject => ("approver.rejected", "rejected"),
    };
    Ok(AuditAppend {
        workflow_id: workflow_id.clone(),
        level_id: Some(level_id.clone()),
        timestamp: decision.decided_at,
        actor: decision.approver_name.clone(),
        kind: AuditKind::Decision,
        action: action.to_string(),
        message: format!(
            "{} {verb} level {} in round {}",
            decision.approver_name, decision.level_number, decision.round
        ),
        payload: to_payload(decision)?,
    })
}

/// Entry for a comment, with its full content
pub fn comment_entry(workflow_id: &WorkflowId, comment: &Comment) -> ReviewResult<AuditAppend> {
    Ok(AuditAppend {
        workflow_id: workflow_id.clone(),
        level_id: Some(comment.level_id.clone()),
        timestamp: comment.created_at,
        actor: comment.author_name.clone(),
        kind: AuditKind::Comment,
        action: "comment.added".to_string(),
        message: format!("{} commented", comment.author_name),
        payload: to_payload(comment)?,
    })
}

/// Check sequencing, linkage and content hashes of a chain
pub fn verify_records(
    workflow_id: &WorkflowId,
    records: &[AuditRecord],
) -> ReviewResult<ChainVerification> {
    let mut previous: Option<&str> = None;
    let mut broken_at = None;

    for (index, record) in records.iter().enumerate() {
        let expected_hash = record.expected_hash()?;
        let linked = record.previous_hash.as_deref() == previous;
        if record.sequence != index as u64 + 1 || !linked || expected_hash != record.hash {
            broken_at = Some(record.sequence);
            break;
        }
        previous = Some(record.hash.as_str());
    }

    if let Some(sequence) = broken_at {
        tracing::warn!(workflow_id = %workflow_id, sequence, "Audit chain broken");
    }
    Ok(ChainVerification {
        workflow_id: workflow_id.clone(),
        records: records.len(),
        intact: broken_at.is_none(),
        broken_at,
    })
}

fn to_payload<T: Serialize>(value: &T) -> ReviewResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ReviewError::Storage(e.to_string()))
}

fn describe(event: &ReviewEvent) -> String {
    match event {
        ReviewEvent::WorkflowCreated {
            version_id,
            workflow_type,
            ..
        } => format!("Workflow created for version {version_id} ({workflow_type})"),
        ReviewEvent::ReviewStarted { .. } => "Review started".to_string(),
        ReviewEvent::LevelActivated { level_number, .. } => {
            format!("Level {level_number} activated")
        }
        ReviewEvent::LevelApproved { .. } => "Level approved".to_string(),
        ReviewEvent::LevelRejected { reason, .. } => format!(
            "Level rejected: {}",
            reason.as_deref().unwrap_or("no reason given")
        ),
        ReviewEvent::RevisionRequested { round, .. } => {
            format!("Revision requested, round {round} opened")
        }
        ReviewEvent::Resubmitted {
            round, version_id, ..
        } => format!("Resubmitted for round {round} on version {version_id}"),
        ReviewEvent::ChecklistEvaluated {
            status,
            overall_score,
            ..
        } => format!("Checklist {} (score {overall_score:.2})", status.as_str()),
        ReviewEvent::CommentAdded { .. } => "Comment added".to_string(),
        ReviewEvent::WorkflowApproved { .. } => "Workflow approved".to_string(),
        ReviewEvent::WorkflowRejected { .. } => "Workflow rejected".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_storage::InMemoryReviewStorage;
    use review_types::ApproverId;

    fn store() -> Arc<InMemoryReviewStorage> {
        Arc::new(InMemoryReviewStorage::new())
    }

    #[test]
    fn test_events_are_recorded_in_order() {
        let store = store();
        let trail = AuditTrail::new(store.clone());
        let wf = WorkflowId::new("wf-1");
        let events = vec![
            ReviewEvent::ReviewStarted { workflow_id: wf.clone() },
            ReviewEvent::LevelRejected {
                workflow_id: wf.clone(),
                level_id: LevelId::new("l2"),
                reason: Some("missing asset".into()),
            },
        ];
        for entry in event_entries(&events, "Ben").unwrap() {
            store.append_audit(entry).unwrap();
        }

        let history = trail.query(&wf).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "workflow.review_started");
        assert_eq!(history[1].message, "Level rejected: missing asset");
        assert_eq!(history[1].level_id, Some(LevelId::new("l2")));
        assert!(trail.verify_chain(&wf).unwrap().intact);
    }

    #[test]
    fn test_decision_entry() {
        let entry = decision_entry(
            &WorkflowId::new("wf-1"),
            &LevelId::new("l1"),
            &DecisionRecord {
                round: 2,
                level_number: 1,
                approver_id: ApproverId::new("u-ana"),
                approver_name: "Ana".into(),
                decision: Decision::Approve,
                comment: None,
                decided_at: chrono::Utc::now(),
            },
        )
        .unwrap();
        assert_eq!(entry.kind, AuditKind::Decision);
        assert_eq!(entry.action, "approver.approved");
        assert_eq!(entry.message, "Ana approved level 1 in round 2");
    }

    #[test]
    fn test_tampered_chain_is_detected() {
        let store = store();
        let trail = AuditTrail::new(store.clone());
        let wf = WorkflowId::new("wf-1");
        for _ in 0..3 {
            let entry =
                event_entry(&ReviewEvent::ReviewStarted { workflow_id: wf.clone() }, "system")
                    .unwrap();
            store.append_audit(entry).unwrap();
        }
        let mut records = trail.query(&wf).unwrap();
        assert!(verify_records(&wf, &records).unwrap().intact);

        records[1].actor = "mallory".into();
        let report = verify_records(&wf, &records).unwrap();
        assert!(!report.intact);
        assert_eq!(report.broken_at, Some(2));
        assert_eq!(report.records, 3);
    }
}
