//! History navigation over an [`ObjectGraph`].
//!
//! All walks take `&dyn ObjectGraph` so any provider can be plugged in.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use refdb_types::{ObjectId, ObjectKind};

use crate::error::{GraphError, GraphResult};
use crate::object::{Commit, GraphObject};
use crate::traits::ObjectGraph;

/// Upper bound on tag-to-tag hops while peeling.
const MAX_PEEL_DEPTH: usize = 64;

fn load(graph: &dyn ObjectGraph, id: &ObjectId) -> GraphResult<GraphObject> {
    graph.object(id)?.ok_or(GraphError::NotFound(*id))
}

/// Peel `id` towards an object of kind `target`.
///
/// With `None`, annotated tags are followed until the first non-tag object.
/// With `Some(kind)`, tags are followed and a commit can be peeled to its tree;
/// anything else that does not already have the requested kind is a
/// [`GraphError::TypeMismatch`].
pub fn peel(
    graph: &dyn ObjectGraph,
    id: &ObjectId,
    target: Option<ObjectKind>,
) -> GraphResult<(ObjectId, ObjectKind)> {
    let mut current = *id;
    for _ in 0..MAX_PEEL_DEPTH {
        let object = load(graph, &current)?;
        let kind = object.kind();
        if target == Some(kind) {
            return Ok((current, kind));
        }
        match object {
            GraphObject::Tag(tag) => current = tag.target,
            GraphObject::Commit(commit) if target == Some(ObjectKind::Tree) => {
                return Ok((commit.tree, ObjectKind::Tree));
            }
            _ => {
                return match target {
                    None => Ok((current, kind)),
                    Some(expected) => Err(GraphError::TypeMismatch {
                        id: current,
                        expected,
                        actual: kind,
                    }),
                };
            }
        }
    }
    Err(GraphError::TypeMismatch {
        id: current,
        expected: target.unwrap_or(ObjectKind::Commit),
        actual: ObjectKind::Tag,
    })
}

/// Peel `id` to a commit and load it.
pub fn peel_to_commit(graph: &dyn ObjectGraph, id: &ObjectId) -> GraphResult<(ObjectId, Commit)> {
    let (commit_id, _) = peel(graph, id, Some(ObjectKind::Commit))?;
    match load(graph, &commit_id)? {
        GraphObject::Commit(commit) => Ok((commit_id, commit)),
        other => Err(GraphError::TypeMismatch {
            id: commit_id,
            expected: ObjectKind::Commit,
            actual: other.kind(),
        }),
    }
}

/// The `n`th parent of the commit `id` peels to; `n == 0` is the commit itself.
pub fn nth_parent(graph: &dyn ObjectGraph, id: &ObjectId, n: usize) -> GraphResult<ObjectId> {
    let (commit_id, commit) = peel_to_commit(graph, id)?;
    if n == 0 {
        return Ok(commit_id);
    }
    commit
        .parents
        .get(n - 1)
        .copied()
        .ok_or(GraphError::NoSuchParent { id: commit_id, n })
}

/// Follow first parents `n` times; `n == 0` is the commit itself.
pub fn nth_ancestor(graph: &dyn ObjectGraph, id: &ObjectId, n: usize) -> GraphResult<ObjectId> {
    let (mut current, _) = peel(graph, id, Some(ObjectKind::Commit))?;
    for _ in 0..n {
        current = nth_parent(graph, &current, 1)?;
    }
    Ok(current)
}

/// Best common ancestor of two commits.
///
/// Computes the ancestor sets of both commits (each including the commit
/// itself), intersects them, and discards every common ancestor that is itself
/// an ancestor of another common ancestor. Among the remaining candidates the
/// most recently committed wins; equal timestamps fall back to the smallest id.
/// Returns `Ok(None)` when the histories are unrelated.
pub fn merge_base(graph: &dyn ObjectGraph, a: &ObjectId, b: &ObjectId) -> GraphResult<Option<ObjectId>> {
    let (a, _) = peel_to_commit(graph, a)?;
    let (b, _) = peel_to_commit(graph, b)?;
    if a == b {
        return Ok(Some(a));
    }

    let ancestors_a = ancestors_inclusive(graph, &a)?;
    let ancestors_b = ancestors_inclusive(graph, &b)?;
    let common: HashSet<ObjectId> = ancestors_a.intersection(&ancestors_b).copied().collect();
    if common.is_empty() {
        debug!(a = %a.short_hex(), b = %b.short_hex(), "no merge base");
        return Ok(None);
    }

    // Everything reachable from a parent of a common ancestor is redundant.
    let mut redundant = HashSet::new();
    let mut queue = VecDeque::new();
    for id in &common {
        for parent in commit_parents(graph, id)? {
            if redundant.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    while let Some(current) = queue.pop_front() {
        for parent in commit_parents(graph, &current)? {
            if redundant.insert(parent) {
                queue.push_back(parent);
            }
        }
    }

    let mut best: Option<(i64, ObjectId)> = None;
    for id in common.difference(&redundant) {
        let (_, commit) = peel_to_commit(graph, id)?;
        let when = commit.committer.when.seconds;
        best = match best {
            Some((t, cur)) if t > when || (t == when && cur < *id) => Some((t, cur)),
            _ => Some((when, *id)),
        };
    }

    let base = best.map(|(_, id)| id);
    if let Some(base) = &base {
        debug!(a = %a.short_hex(), b = %b.short_hex(), base = %base.short_hex(), "merge base");
    }
    Ok(base)
}

fn commit_parents(graph: &dyn ObjectGraph, id: &ObjectId) -> GraphResult<Vec<ObjectId>> {
    match load(graph, id)? {
        GraphObject::Commit(commit) => Ok(commit.parents),
        _ => Ok(Vec::new()),
    }
}

/// All ancestors of a commit, including the commit itself.
fn ancestors_inclusive(graph: &dyn ObjectGraph, id: &ObjectId) -> GraphResult<HashSet<ObjectId>> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(*id);
    queue.push_back(*id);

    while let Some(current) = queue.pop_front() {
        for parent in commit_parents(graph, &current)? {
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }

    Ok(visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGraph;

    #[test]
    fn nth_parent_zero_is_self() {
        let graph = InMemoryGraph::new();
        let ids = graph.linear_history(2).unwrap();
        assert_eq!(nth_parent(&graph, &ids[1], 0).unwrap(), ids[1]);
        assert_eq!(nth_parent(&graph, &ids[1], 1).unwrap(), ids[0]);
    }

    #[test]
    fn nth_parent_beyond_parents_is_not_found() {
        let graph = InMemoryGraph::new();
        let ids = graph.linear_history(2).unwrap();
        let err = nth_parent(&graph, &ids[1], 2).unwrap_err();
        assert!(matches!(err, GraphError::NoSuchParent { n: 2, .. }));
    }

    #[test]
    fn second_parent_of_merge() {
        let graph = InMemoryGraph::new();
        let root = graph.commit(&[], "root").unwrap();
        let left = graph.commit(&[root], "left").unwrap();
        let right = graph.commit(&[root], "right").unwrap();
        let merge = graph.commit(&[left, right], "merge").unwrap();
        assert_eq!(nth_parent(&graph, &merge, 2).unwrap(), right);
    }

    #[test]
    fn nth_ancestor_walks_first_parents() {
        let graph = InMemoryGraph::new();
        let ids = graph.linear_history(4).unwrap();
        assert_eq!(nth_ancestor(&graph, &ids[3], 2).unwrap(), ids[1]);
        assert_eq!(nth_ancestor(&graph, &ids[3], 0).unwrap(), ids[3]);
        assert!(nth_ancestor(&graph, &ids[3], 4).is_err());
    }

    #[test]
    fn peel_tag_chain_to_commit() {
        let graph = InMemoryGraph::new();
        let commit = graph.commit(&[], "root").unwrap();
        let inner = graph.tag(commit, "inner", "").unwrap();
        let outer = graph.tag(inner, "outer", "").unwrap();

        assert_eq!(peel(&graph, &outer, None).unwrap(), (commit, ObjectKind::Commit));
        assert_eq!(
            peel(&graph, &outer, Some(ObjectKind::Commit)).unwrap(),
            (commit, ObjectKind::Commit)
        );
        assert_eq!(peel(&graph, &outer, Some(ObjectKind::Tag)).unwrap(), (outer, ObjectKind::Tag));
    }

    #[test]
    fn peel_commit_to_tree() {
        let graph = InMemoryGraph::new();
        let commit = graph.commit(&[], "root").unwrap();
        let (tree, kind) = peel(&graph, &commit, Some(ObjectKind::Tree)).unwrap();
        assert_eq!(kind, ObjectKind::Tree);
        let (_, loaded) = peel_to_commit(&graph, &commit).unwrap();
        assert_eq!(loaded.tree, tree);
    }

    #[test]
    fn peel_blob_to_commit_is_type_mismatch() {
        let graph = InMemoryGraph::new();
        let blob = graph.blob(b"data").unwrap();
        let err = peel(&graph, &blob, Some(ObjectKind::Commit)).unwrap_err();
        assert!(matches!(
            err,
            GraphError::TypeMismatch {
                expected: ObjectKind::Commit,
                actual: ObjectKind::Blob,
                ..
            }
        ));
    }

    #[test]
    fn merge_base_linear() {
        let graph = InMemoryGraph::new();
        let ids = graph.linear_history(4).unwrap();
        assert_eq!(merge_base(&graph, &ids[1], &ids[3]).unwrap(), Some(ids[1]));
        assert_eq!(merge_base(&graph, &ids[2], &ids[2]).unwrap(), Some(ids[2]));
    }

    #[test]
    fn merge_base_fork() {
        let graph = InMemoryGraph::new();
        let root = graph.commit(&[], "root").unwrap();
        let base = graph.commit(&[root], "base").unwrap();
        let a = graph.commit(&[base], "a").unwrap();
        let b1 = graph.commit(&[base], "b1").unwrap();
        let b2 = graph.commit(&[b1], "b2").unwrap();
        assert_eq!(merge_base(&graph, &a, &b2).unwrap(), Some(base));
    }

    #[test]
    fn merge_base_criss_cross_picks_latest() {
        let graph = InMemoryGraph::new();
        let root = graph.commit(&[], "root").unwrap();
        let x = graph.commit(&[root], "x").unwrap();
        let y = graph.commit(&[root], "y").unwrap();
        let a = graph.commit(&[x, y], "a").unwrap();
        let b = graph.commit(&[y, x], "b").unwrap();
        // x and y are both best common ancestors; y was committed later.
        assert_eq!(merge_base(&graph, &a, &b).unwrap(), Some(y));
    }

    #[test]
    fn merge_base_unrelated_is_none() {
        let graph = InMemoryGraph::new();
        let a = graph.commit(&[], "a").unwrap();
        let b = graph.commit(&[], "b").unwrap();
        assert_eq!(merge_base(&graph, &a, &b).unwrap(), None);
    }
}
