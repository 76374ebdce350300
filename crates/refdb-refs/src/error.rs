//! Error types for reference operations.

use refdb_types::{ErrorCode, TypeError};
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The reference was not found.
    #[error("ref not found: {name}")]
    NotFound { name: String },

    /// A reference with this name already exists.
    #[error("ref already exists: {name}")]
    AlreadyExists { name: String },

    /// The name collides with an existing ref one directory level up or down
    /// (`refs/heads/a` vs `refs/heads/a/b`).
    #[error("'{existing}' exists; cannot create '{name}'")]
    HierarchyConflict { name: String, existing: String },

    /// The reference name is invalid.
    #[error("invalid ref name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The glob pattern is invalid.
    #[error("invalid glob {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// More than one reference matches a shorthand.
    #[error("ambiguous ref {name:?}: matches {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },

    /// The reference is direct where symbolic was required, or the reverse.
    #[error("ref {name} is not a {expected} reference")]
    TypeMismatch { name: String, expected: &'static str },

    /// Following symbolic references looped or exceeded the depth limit.
    #[error("symbolic ref cycle at {name} after {depth} hops")]
    Cycle { name: String, depth: usize },

    /// The stored value no longer matches the caller's snapshot.
    #[error("ref {name} changed: expected {expected}, found {actual}")]
    Conflict {
        name: String,
        expected: String,
        actual: String,
    },

    /// Another process holds the lock file for this reference.
    #[error("ref {name} is locked by another writer")]
    Locked { name: String },

    /// A callback asked iteration to stop.
    #[error("iteration aborted by callback (code {code})")]
    UserAborted { code: i32 },

    /// A stored ref or reflog could not be parsed.
    #[error("corrupt ref {name}: {reason}")]
    Corrupt { name: String, reason: String },

    /// The store configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal storage failure (e.g. a poisoned lock).
    #[error("storage error: {0}")]
    Storage(String),

    /// Malformed object id.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RefError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } | Self::HierarchyConflict { .. } => ErrorCode::AlreadyExists,
            Self::InvalidName { .. } | Self::InvalidGlob { .. } | Self::Config(_) => {
                ErrorCode::InvalidSpec
            }
            Self::Type(e) => e.code(),
            Self::Ambiguous { .. } => ErrorCode::Ambiguous,
            Self::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Self::Cycle { .. } => ErrorCode::ReferenceCycle,
            Self::Conflict { .. } | Self::Locked { .. } => ErrorCode::Conflict,
            Self::UserAborted { .. } => ErrorCode::UserAborted,
            Self::Corrupt { .. } | Self::Serialization(_) | Self::Storage(_) | Self::Io(_) => {
                ErrorCode::StorageFailure
            }
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn poisoned(e: impl std::fmt::Display) -> Self {
        Self::Storage(format!("lock poisoned: {e}"))
    }
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
