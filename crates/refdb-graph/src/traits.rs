//! The [`ObjectGraph`] trait: the object database as the resolver sees it.

use refdb_types::{HexPrefix, ObjectId, ObjectKind};

use crate::error::GraphResult;
use crate::object::GraphObject;

/// Read access to an object database.
///
/// Implementations must be thread-safe (`Send + Sync`). Objects are
/// immutable, so concurrent reads need no coordination.
pub trait ObjectGraph: Send + Sync {
    /// Read an object by id.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn object(&self, id: &ObjectId) -> GraphResult<Option<GraphObject>>;

    /// All object ids whose hex form starts with `prefix`.
    ///
    /// The caller decides what zero or several matches mean.
    fn find_by_prefix(&self, prefix: &HexPrefix) -> GraphResult<Vec<ObjectId>>;

    /// The kind of an object, or `None` if it does not exist.
    fn kind(&self, id: &ObjectId) -> GraphResult<Option<ObjectKind>> {
        Ok(self.object(id)?.map(|o| o.kind()))
    }

    /// Returns `true` if the object exists.
    fn contains(&self, id: &ObjectId) -> GraphResult<bool> {
        Ok(self.object(id)?.is_some())
    }
}
