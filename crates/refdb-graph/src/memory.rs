//! In-memory object graph for tests and embedding.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use tracing::debug;

use refdb_types::{HashKind, HexPrefix, ObjectId, Signature, Time};

use crate::error::{GraphError, GraphResult};
use crate::hasher::ContentHasher;
use crate::object::{Blob, Commit, GraphObject, Tag, Tree};
use crate::traits::ObjectGraph;

/// Commit timestamps handed out by [`InMemoryGraph::commit`] start here and
/// increase by one second per commit, so history order is reproducible.
const BASE_TIME: i64 = 1_700_000_000;

/// A `HashMap`-backed [`ObjectGraph`].
///
/// Object ids are domain-separated content hashes of the JSON encoding of each
/// object, truncated to the configured width.
pub struct InMemoryGraph {
    width: HashKind,
    objects: RwLock<HashMap<ObjectId, GraphObject>>,
    clock: AtomicI64,
}

impl InMemoryGraph {
    /// Create an empty graph producing 32-byte ids.
    pub fn new() -> Self {
        Self::with_hash_kind(HashKind::Blake3)
    }

    /// Create an empty graph producing ids of the given width.
    pub fn with_hash_kind(width: HashKind) -> Self {
        Self {
            width,
            objects: RwLock::new(HashMap::new()),
            clock: AtomicI64::new(BASE_TIME),
        }
    }

    /// Width of the ids this graph produces.
    pub fn hash_kind(&self) -> HashKind {
        self.width
    }

    /// Number of objects in the graph.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the graph holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an object and return its id. Idempotent.
    ///
    /// Parents of commits and targets of tags must already be present.
    pub fn insert(&self, object: GraphObject) -> GraphResult<ObjectId> {
        let id = ContentHasher::for_kind(object.kind()).hash_json(&object, self.width)?;
        let mut map = self
            .objects
            .write()
            .map_err(|e| GraphError::Storage(format!("lock poisoned: {e}")))?;

        match &object {
            GraphObject::Commit(c) => {
                for parent in &c.parents {
                    if !map.contains_key(parent) {
                        return Err(GraphError::NotFound(*parent));
                    }
                }
            }
            GraphObject::Tag(t) => {
                if !map.contains_key(&t.target) {
                    return Err(GraphError::NotFound(t.target));
                }
            }
            GraphObject::Tree(_) | GraphObject::Blob(_) => {}
        }

        map.entry(id).or_insert(object);
        debug!(id = %id.short_hex(), "inserted graph object");
        Ok(id)
    }

    /// Insert a blob.
    pub fn blob(&self, data: &[u8]) -> GraphResult<ObjectId> {
        self.insert(GraphObject::Blob(Blob {
            data: data.to_vec(),
        }))
    }

    /// Insert a tree from `(name, id)` entries.
    pub fn tree<'a>(&self, entries: impl IntoIterator<Item = (&'a str, ObjectId)>) -> GraphResult<ObjectId> {
        let entries: BTreeMap<String, ObjectId> =
            entries.into_iter().map(|(n, id)| (n.to_string(), id)).collect();
        self.insert(GraphObject::Tree(Tree { entries }))
    }

    /// Insert a commit over an empty tree with the given parents.
    ///
    /// Each call advances the graph's clock by one second.
    pub fn commit(&self, parents: &[ObjectId], message: &str) -> GraphResult<ObjectId> {
        let tree = self.tree(std::iter::empty())?;
        let seconds = self.clock.fetch_add(1, Ordering::SeqCst);
        self.insert(GraphObject::Commit(Commit {
            tree,
            parents: parents.to_vec(),
            committer: Signature::new("refdb", "refdb@localhost", Time::new(seconds, 0)),
            message: message.to_string(),
        }))
    }

    /// Insert an annotated tag pointing at `target`.
    pub fn tag(&self, target: ObjectId, name: &str, message: &str) -> GraphResult<ObjectId> {
        let target_kind = self.kind(&target)?.ok_or(GraphError::NotFound(target))?;
        self.insert(GraphObject::Tag(Tag {
            target,
            target_kind,
            name: name.to_string(),
            message: message.to_string(),
        }))
    }

    /// Insert a linear history of `n` commits and return their ids, oldest first.
    pub fn linear_history(&self, n: usize) -> GraphResult<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = Vec::with_capacity(n);
        for i in 0..n {
            let parents: Vec<ObjectId> = ids.last().copied().into_iter().collect();
            ids.push(self.commit(&parents, &format!("C{i}"))?);
        }
        Ok(ids)
    }
}

impl Default for InMemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectGraph for InMemoryGraph {
    fn object(&self, id: &ObjectId) -> GraphResult<Option<GraphObject>> {
        let map = self
            .objects
            .read()
            .map_err(|e| GraphError::Storage(format!("lock poisoned: {e}")))?;
        Ok(map.get(id).cloned())
    }

    fn find_by_prefix(&self, prefix: &HexPrefix) -> GraphResult<Vec<ObjectId>> {
        let map = self
            .objects
            .read()
            .map_err(|e| GraphError::Storage(format!("lock poisoned: {e}")))?;
        let mut ids: Vec<ObjectId> = map.keys().filter(|id| prefix.matches(id)).copied().collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGraph")
            .field("width", &self.width)
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdb_types::ObjectKind;

    #[test]
    fn insert_is_idempotent() {
        let graph = InMemoryGraph::new();
        let a = graph.blob(b"same").unwrap();
        let b = graph.blob(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn commits_get_distinct_ids_and_times() {
        let graph = InMemoryGraph::new();
        let ids = graph.linear_history(3).unwrap();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);

        let c2 = graph.object(&ids[2]).unwrap().unwrap();
        let c2 = c2.as_commit().unwrap();
        assert_eq!(c2.parents, vec![ids[1]]);
    }

    #[test]
    fn commit_with_missing_parent_is_rejected() {
        let graph = InMemoryGraph::new();
        let ghost = ObjectId::from_bytes(b"ghost");
        let err = graph.commit(&[ghost], "orphan").unwrap_err();
        assert!(matches!(err, GraphError::NotFound(id) if id == ghost));
    }

    #[test]
    fn tag_records_target_kind() {
        let graph = InMemoryGraph::new();
        let blob = graph.blob(b"payload").unwrap();
        let tag = graph.tag(blob, "v1", "release").unwrap();
        let obj = graph.object(&tag).unwrap().unwrap();
        assert_eq!(obj.as_tag().unwrap().target_kind, ObjectKind::Blob);
    }

    #[test]
    fn find_by_prefix_returns_matches() {
        let graph = InMemoryGraph::new();
        let id = graph.blob(b"findme").unwrap();
        let prefix = HexPrefix::new(&id.to_hex()[..8]).unwrap();
        assert_eq!(graph.find_by_prefix(&prefix).unwrap(), vec![id]);
    }

    #[test]
    fn sha1_width_graph_produces_short_ids() {
        let graph = InMemoryGraph::with_hash_kind(HashKind::Sha1);
        let id = graph.commit(&[], "root").unwrap();
        assert_eq!(id.kind(), HashKind::Sha1);
        assert_eq!(id.to_hex().len(), 40);
    }
}
