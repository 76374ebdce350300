//! Error types for object graph access.

use refdb_types::{ErrorCode, ObjectId, ObjectKind};

/// Errors that can occur while reading or walking the object graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The object is not in the graph.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// A commit has fewer parents than requested.
    #[error("commit {id} has no parent number {n}")]
    NoSuchParent { id: ObjectId, n: usize },

    /// The object cannot be peeled or used as the requested kind.
    #[error("object {id} is a {actual}, cannot be used as a {expected}")]
    TypeMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Serialization failure while hashing an object.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl GraphError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) | Self::NoSuchParent { .. } => ErrorCode::NotFound,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Serialization(_) | Self::Storage(_) => ErrorCode::StorageFailure,
        }
    }
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
