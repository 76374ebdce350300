//! The [`RefBackend`] trait defining the reference storage interface.
//!
//! A backend is a durable key-value map from reference name to [`Reference`],
//! plus one append-only log per name. It knows nothing about symbolic
//! resolution, naming rules, or logging policy; the
//! [`RefStore`](crate::RefStore) decides all of that and hands the backend
//! fully formed [`RefUpdate`]s.

use crate::error::{RefError, Result};
use crate::types::{RefLogEntry, Reference, Target};

/// A reflog entry to append as part of an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogAppend {
    /// Name of the reference whose log receives the entry.
    pub name: String,
    pub entry: RefLogEntry,
}

/// One atomic change to the backend.
///
/// Every variant names the value the caller expects to find, and the backend
/// compares it against storage while holding its own write lock. A mismatch
/// fails the whole update, so writers that do not share a [`RefStore`]
/// (another process on the same directory) cannot overwrite each other.
///
/// [`RefStore`]: crate::RefStore
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefUpdate {
    /// Create or replace `reference`, appending `logs`. `expected` is the
    /// current target, or `None` when the name must not exist yet.
    Write {
        reference: Reference,
        expected: Option<Target>,
        logs: Vec<LogAppend>,
    },
    /// Remove `name` and its log.
    Delete { name: String, expected: Target },
    /// Remove `from`, move its log (if any) to `reference.name()`, write
    /// `reference`, then append `logs`.
    ///
    /// `displaced` is the destination's current target, or `None` when it
    /// must not exist. `follow` is a symbolic reference currently pointing at
    /// `from` (normally `HEAD`) that is rewritten in the same update.
    Rename {
        from: String,
        expected: Target,
        reference: Reference,
        displaced: Option<Target>,
        follow: Option<Reference>,
        logs: Vec<LogAppend>,
    },
}

/// Fail unless `current` holds `expected`.
///
/// Finding a reference where none was expected is [`RefError::AlreadyExists`];
/// a missing one is [`RefError::NotFound`]; any other difference is
/// [`RefError::Conflict`].
pub(crate) fn check_expected(name: &str, expected: Option<&Target>, current: Option<&Reference>) -> Result<()> {
    match (expected, current) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(RefError::AlreadyExists {
            name: name.to_string(),
        }),
        (Some(_), None) => Err(RefError::not_found(name)),
        (Some(expected), Some(current)) if current.target() == expected => Ok(()),
        (Some(expected), Some(current)) => Err(RefError::Conflict {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: current.target().to_string(),
        }),
    }
}

/// `refs/heads/a` and `refs/heads/a/b` cannot both exist.
pub(crate) fn check_hierarchy<'a>(name: &str, existing: impl IntoIterator<Item = &'a str>) -> Result<()> {
    for other in existing {
        if is_dir_prefix(other, name) || is_dir_prefix(name, other) {
            return Err(RefError::HierarchyConflict {
                name: name.to_string(),
                existing: other.to_string(),
            });
        }
    }
    Ok(())
}

fn is_dir_prefix(dir: &str, name: &str) -> bool {
    name.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Storage backend for named references and their logs.
///
/// Implementations must be thread-safe (`Send + Sync`) and apply each
/// [`RefUpdate`] atomically: after a failed `apply` the backend holds exactly
/// what it held before, including the logs. Serializing concurrent updates of
/// the same name within one process is the caller's job; the `expected`
/// values in each update catch writers the caller cannot see.
pub trait RefBackend: Send + Sync {
    /// Read a reference by its full name.
    ///
    /// Returns `Ok(None)` if the reference does not exist.
    fn read(&self, name: &str) -> Result<Option<Reference>>;

    /// All reference names, sorted.
    fn names(&self) -> Result<Vec<String>>;

    /// Apply one update atomically.
    fn apply(&self, update: RefUpdate) -> Result<()>;

    /// The log of `name`, oldest entry first. Empty if there is no log.
    fn read_log(&self, name: &str) -> Result<Vec<RefLogEntry>>;

    /// Whether a log exists for `name` (it may be empty).
    fn has_log(&self, name: &str) -> Result<bool>;

    /// Create an empty log for `name` if none exists.
    fn create_log(&self, name: &str) -> Result<()>;
}
