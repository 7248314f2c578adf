//! Deliverables and their immutable versions

use crate::{DeliverableId, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked work product. Owned by the collaborator that registers it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: DeliverableId,
    pub title: String,
    /// Free-form kind, e.g. "design", "report", "video"
    pub deliverable_type: String,
    pub created_at: DateTime<Utc>,
}

impl Deliverable {
    pub fn new(title: impl Into<String>, deliverable_type: impl Into<String>) -> Self {
        Self {
            id: DeliverableId::generate(),
            title: title.into(),
            deliverable_type: deliverable_type.into(),
            created_at: Utc::now(),
        }
    }
}

/// Immutable snapshot of a deliverable submitted for review.
///
/// `version_number` increases monotonically per deliverable. The file
/// itself lives elsewhere and is only referenced by URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub deliverable_id: DeliverableId,
    pub version_number: u32,
    pub file_url: String,
    pub change_log: String,
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// Whether this version supersedes `other` for the same deliverable
    pub fn supersedes(&self, other: &Version) -> bool {
        self.deliverable_id == other.deliverable_id && self.version_number > other.version_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(deliverable: &DeliverableId, number: u32) -> Version {
        Version {
            id: VersionId::generate(),
            deliverable_id: deliverable.clone(),
            version_number: number,
            file_url: format!("s3://bucket/deliverable-v{number}.pdf"),
            change_log: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_supersedes_same_deliverable_only() {
        let deliverable = Deliverable::new("Brand guide", "design");
        let v1 = version(&deliverable.id, 1);
        let v2 = version(&deliverable.id, 2);
        assert!(v2.supersedes(&v1));
        assert!(!v1.supersedes(&v2));
        assert!(!v1.supersedes(&v1));

        let other = version(&DeliverableId::new("other"), 9);
        assert!(!other.supersedes(&v1));
    }
}
