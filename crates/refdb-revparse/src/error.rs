//! Error types for revision resolution.

use refdb_branch::BranchError;
use refdb_graph::GraphError;
use refdb_refs::RefError;
use refdb_types::{ErrorCode, ObjectId, TypeError};
use thiserror::Error;

/// Errors that can occur while parsing or resolving a revision.
#[derive(Debug, Error)]
pub enum RevParseError {
    /// The expression is malformed or uses unsupported syntax.
    #[error("invalid revision {spec:?}: {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Nothing matches the name.
    #[error("revision not found: {spec}")]
    NotFound { spec: String },

    /// An abbreviated id matches several objects.
    #[error("short id {prefix} is ambiguous: {} candidates", .candidates.len())]
    Ambiguous {
        prefix: String,
        candidates: Vec<ObjectId>,
    },

    /// The reflog does not reach back far enough.
    #[error("log for {name} has only {available} entries, cannot go back {requested}")]
    ReflogTooShort {
        name: String,
        requested: usize,
        available: usize,
    },

    /// `a...b` over unrelated histories.
    #[error("no merge base between {from} and {to}")]
    NoMergeBase { from: ObjectId, to: ObjectId },

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Branch(#[from] BranchError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl RevParseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSpec { .. } => ErrorCode::InvalidSpec,
            Self::NotFound { .. } | Self::ReflogTooShort { .. } | Self::NoMergeBase { .. } => {
                ErrorCode::NotFound
            }
            Self::Ambiguous { .. } => ErrorCode::Ambiguous,
            Self::Ref(e) => e.code(),
            Self::Graph(e) => e.code(),
            Self::Branch(e) => e.code(),
            Self::Type(e) => e.code(),
        }
    }
}

/// Convenience type alias for revision operations.
pub type Result<T> = std::result::Result<T, RevParseError>;
