//! Identifiers for review entities
//!
//! All identifiers are opaque strings. Generated ids are UUID v4; ids that
//! arrive from collaborators (approver identities, external emails) are
//! taken as-is.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self) -> &str {
                self.0.get(..8).unwrap_or(&self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Stable identity of a work product
    DeliverableId
);
string_id!(
    /// One immutable snapshot of a deliverable
    VersionId
);
string_id!(
    /// One approval process bound to a version
    WorkflowId
);
string_id!(
    /// One approval stage inside a workflow
    LevelId
);
string_id!(
    /// A pre-resolved approver identity
    ApproverId
);
string_id!(CommentId);
string_id!(ChecklistId);
string_id!(ChecklistItemId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(WorkflowId::generate(), WorkflowId::generate());
    }

    #[test]
    fn test_short_and_display() {
        let id = LevelId::new("0123456789abcdef");
        assert_eq!(id.short(), "01234567");
        assert_eq!(id.to_string(), "0123456789abcdef");

        let tiny = ApproverId::new("bo");
        assert_eq!(tiny.short(), "bo");
    }

    #[test]
    fn test_serializes_transparently() {
        let id = VersionId::new("v-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"v-1\"");
    }
}
