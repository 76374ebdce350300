//! Error types for branch and configuration operations.

use refdb_graph::GraphError;
use refdb_refs::RefError;
use refdb_types::{ErrorCode, ObjectId, ObjectKind};
use thiserror::Error;

/// Errors from a [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Keys look like `section.name` or `section.subsection.name`.
    #[error("invalid config key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The config file is not valid TOML of the expected shape.
    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config serialization error: {0}")]
    Serialization(String),

    #[error("config storage error: {0}")]
    Storage(String),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidKey { .. } => ErrorCode::InvalidSpec,
            Self::Parse(_) | Self::Serialization(_) | Self::Storage(_) | Self::Io(_) => {
                ErrorCode::StorageFailure
            }
        }
    }
}

/// Errors that can occur during branch operations.
#[derive(Debug, Error)]
pub enum BranchError {
    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The branch is the one `HEAD` points at.
    #[error("branch {name} is checked out")]
    CheckedOut { name: String },

    /// Branches can only point at commits.
    #[error("{id} is a {kind}, not a commit")]
    NotACommit { id: ObjectId, kind: ObjectKind },

    /// The branch name is not usable under `refs/heads/`.
    #[error("invalid branch name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// The operation needs a local branch.
    #[error("{name} is not a local branch")]
    NotLocal { name: String },

    /// The name is not a remote-tracking branch.
    #[error("{name} is not a remote-tracking branch")]
    NotRemote { name: String },

    /// No upstream is configured for the branch.
    #[error("branch {name} has no upstream")]
    NoUpstream { name: String },
}

impl BranchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Ref(e) => e.code(),
            Self::Graph(e) => e.code(),
            Self::Config(e) => e.code(),
            Self::CheckedOut { .. } => ErrorCode::Conflict,
            Self::NotACommit { .. }
            | Self::InvalidName { .. }
            | Self::NotLocal { .. }
            | Self::NotRemote { .. } => ErrorCode::InvalidSpec,
            Self::NoUpstream { .. } => ErrorCode::NotFound,
        }
    }
}

/// Convenience type alias for branch operations.
pub type Result<T> = std::result::Result<T, BranchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_pass_through_wrapped_errors() {
        let err: BranchError = RefError::NotFound {
            name: "refs/heads/x".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: BranchError = ConfigError::Parse("bad".into()).into();
        assert_eq!(err.code(), ErrorCode::StorageFailure);
    }

    #[test]
    fn branch_specific_codes() {
        let checked_out = BranchError::CheckedOut { name: "main".into() };
        assert_eq!(checked_out.code(), ErrorCode::Conflict);
        let not_commit = BranchError::NotACommit {
            id: ObjectId::from_bytes(b"tree"),
            kind: ObjectKind::Tree,
        };
        assert_eq!(not_commit.code(), ErrorCode::InvalidSpec);
        assert!(not_commit.to_string().contains("tree"));
    }
}
