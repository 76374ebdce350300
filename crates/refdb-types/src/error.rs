use thiserror::Error;

use crate::code::ErrorCode;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected 20 or 32, got {actual}")]
    InvalidLength { actual: usize },

    #[error("invalid object id prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("unknown object kind: {0:?}")]
    UnknownKind(String),
}

impl TypeError {
    /// Every type-level parse failure is a malformed input.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::InvalidSpec
    }
}
