use review_types::ReviewError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A conditional write saw a different token than the caller read
    #[error("conflict on {entity}: expected {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: String,
        found: String,
    },

    #[error("duplicate {entity}: held by {existing}")]
    Duplicate { entity: String, existing: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    /// The engine refused the write from inside a conditional update
    #[error(transparent)]
    Refused(ReviewError),
}

impl From<StorageError> for ReviewError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict {
                entity,
                expected,
                found,
            } => ReviewError::ConcurrentModification {
                entity,
                expected,
                found,
            },
            StorageError::Refused(err) => err,
            other => ReviewError::Storage(other.to_string()),
        }
    }
}
