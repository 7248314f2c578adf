use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use review_types::{ChecklistId, ChecklistItemId, DecisionRecord, LevelId, Workflow, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Concurrency token of a stored workflow.
///
/// `state` moves on every aggregate transition (a full compare-and-swap).
/// `entries` moves on row-level appends that leave the aggregate alone:
/// approver decisions and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Revision {
    pub state: u64,
    pub entries: u64,
}

impl Revision {
    pub fn next_state(self) -> Self {
        Self {
            state: self.state + 1,
            ..self
        }
    }

    pub fn next_entry(self) -> Self {
        Self {
            entries: self.entries + 1,
            ..self
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}.e{}", self.state, self.entries)
    }
}

/// A workflow together with the token it was read at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWorkflow {
    pub workflow: Workflow,
    pub revision: Revision,
}

/// Child records addressable without knowing their workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Level(LevelId),
    Checklist(ChecklistId),
    ChecklistItem(ChecklistItemId),
}

impl std::fmt::Display for ChildRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Level(id) => write!(f, "level {id}"),
            Self::Checklist(id) => write!(f, "checklist {id}"),
            Self::ChecklistItem(id) => write!(f, "checklist item {id}"),
        }
    }
}

/// A single approver decision, written into one slot of one level.
#[derive(Debug, Clone)]
pub struct DecisionWrite {
    pub level_id: LevelId,
    pub record: DecisionRecord,
}

/// What settling a level produced once a decision landed in it.
#[derive(Debug, Clone, Default)]
pub struct Settlement {
    /// The aggregate moved on (level settled), not just one slot
    pub transitioned: bool,
    /// Chained to the workflow's audit trail in the same write
    pub audit: Vec<AuditAppend>,
}

/// What an audit entry documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Transition,
    Decision,
    Comment,
    Checklist,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transition => "transition",
            Self::Decision => "decision",
            Self::Comment => "comment",
            Self::Checklist => "checklist",
        }
    }
}

/// Audit append payload. Hashes and sequencing are assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditAppend {
    pub workflow_id: WorkflowId,
    pub level_id: Option<LevelId>,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub kind: AuditKind,
    /// Event name, e.g. `level.approved`
    pub action: String,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

/// Persistent tamper-evident audit record, chained per workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub workflow_id: WorkflowId,
    pub sequence: u64,
    pub level_id: Option<LevelId>,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub kind: AuditKind,
    pub action: String,
    pub message: String,
    pub payload: Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl AuditRecord {
    pub(crate) fn sealed(
        event: AuditAppend,
        sequence: u64,
        previous_hash: Option<String>,
    ) -> StorageResult<Self> {
        let hash = compute_audit_hash(&event, previous_hash.as_deref(), sequence)?;
        Ok(Self {
            event_id: format!("audit-{}", uuid::Uuid::new_v4()),
            workflow_id: event.workflow_id,
            sequence,
            level_id: event.level_id,
            timestamp: event.timestamp,
            actor: event.actor,
            kind: event.kind,
            action: event.action,
            message: event.message,
            payload: event.payload,
            previous_hash,
            hash,
        })
    }

    /// Recompute the hash this record should carry given its contents.
    pub fn expected_hash(&self) -> StorageResult<String> {
        let event = AuditAppend {
            workflow_id: self.workflow_id.clone(),
            level_id: self.level_id.clone(),
            timestamp: self.timestamp,
            actor: self.actor.clone(),
            kind: self.kind,
            action: self.action.clone(),
            message: self.message.clone(),
            payload: self.payload.clone(),
        };
        compute_audit_hash(&event, self.previous_hash.as_deref(), self.sequence)
    }
}

fn compute_audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "workflow_id": event.workflow_id,
        "level_id": event.level_id,
        "timestamp": event.timestamp,
        "actor": event.actor,
        "kind": event.kind,
        "action": event.action,
        "message": event.message,
        "payload": event.payload,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}
