use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured classification of a failed operation.
///
/// Each crate keeps its own error enum with rich context; `code()` on those
/// enums collapses them onto this shared set so callers can branch on the
/// kind of failure without matching every variant of every crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The named reference or object does not exist.
    NotFound,
    /// A reference with the requested name already exists.
    AlreadyExists,
    /// A name or revision expression is malformed.
    InvalidSpec,
    /// More than one object or reference matches.
    Ambiguous,
    /// A reference or object has the wrong kind for the operation.
    TypeMismatch,
    /// A symbolic reference chain loops or is too deep.
    ReferenceCycle,
    /// A caller-supplied callback requested an early stop.
    UserAborted,
    /// The storage backend failed (I/O, serialization, poisoned lock).
    StorageFailure,
    /// The stored value changed since the caller's snapshot was taken.
    Conflict,
}

impl ErrorCode {
    /// Returns `true` for `UserAborted`, which signals a caller decision rather
    /// than a failure of the store.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, Self::UserAborted)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::InvalidSpec => "invalid spec",
            Self::Ambiguous => "ambiguous",
            Self::TypeMismatch => "type mismatch",
            Self::ReferenceCycle => "reference cycle",
            Self::UserAborted => "user aborted",
            Self::StorageFailure => "storage failure",
            Self::Conflict => "conflict",
        };
        f.write_str(s)
    }
}
