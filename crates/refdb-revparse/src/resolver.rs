//! Evaluation of parsed revision expressions.
//!
//! A name is tried as a full-length object id, then as a reference shorthand,
//! then as an abbreviated id, then as `describe` output (`<tag>-<n>-g<hex>`).
//! Suffix operators are applied left to right. Reference-level operators
//! (`@{n}`, `@{u}`) keep track of the reference they land on so
//! [`Resolver::extended`] can report it.

use tracing::debug;

use refdb_branch::{Branch, BranchManager, ConfigStore};
use refdb_graph::{merge_base, nth_ancestor, nth_parent, peel, ObjectGraph};
use refdb_refs::{RefBackend, RefStore, Reference, HEAD, HEADS_PREFIX};
use refdb_types::{ErrorCode, HashKind, HexPrefix, ObjectId, ObjectKind};

use crate::error::{Result, RevParseError};
use crate::parse::{parse, Base, Expr, Op, PeelTarget, Spec};
use crate::spec::{ResolvedObject, RevFlags, RevisionSpec};

const CHECKOUT_PREFIX: &str = "checkout: moving from ";

/// Where evaluation currently stands.
struct Cursor {
    id: ObjectId,
    /// Set while the expression still names a reference.
    reference: Option<Reference>,
}

impl Cursor {
    fn object(id: ObjectId) -> Self {
        Self { id, reference: None }
    }
}

fn invalid(spec: &str, reason: &str) -> RevParseError {
    RevParseError::InvalidSpec {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}

fn is_full_hex(s: &str) -> bool {
    (s.len() == HashKind::Sha1.hex_len() || s.len() == HashKind::Blake3.hex_len())
        && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// The branch a `checkout: moving from A to B` message left.
fn checkout_source(message: &str) -> Option<&str> {
    let rest = message.strip_prefix(CHECKOUT_PREFIX)?;
    rest.split_once(" to ").map(|(from, _)| from)
}

/// Resolves revision expressions against a reference store and object graph.
pub struct Resolver<'a, B: RefBackend> {
    refs: &'a RefStore<B>,
    graph: &'a dyn ObjectGraph,
    branches: BranchManager<'a, B>,
}

impl<'a, B: RefBackend> Resolver<'a, B> {
    /// `config` supplies branch upstreams for `@{upstream}`.
    pub fn new(refs: &'a RefStore<B>, graph: &'a dyn ObjectGraph, config: &'a dyn ConfigStore) -> Self {
        Self {
            refs,
            graph,
            branches: BranchManager::new(refs, graph, config),
        }
    }

    /// Resolve a single revision. Range syntax is [`RevParseError::InvalidSpec`].
    pub fn single(&self, spec: &str) -> Result<ResolvedObject> {
        self.extended(spec).map(|(object, _)| object)
    }

    /// Resolve a single revision and report the reference it ended at, if
    /// the expression ends at one (`main`, `main@{2}`, `@{u}`, `@{-1}`).
    pub fn extended(&self, spec: &str) -> Result<(ResolvedObject, Option<Reference>)> {
        let Spec::Single(expr) = parse(spec)? else {
            return Err(invalid(spec, "expected a single revision, found a range"));
        };
        let cursor = self.evaluate(spec, &expr)?;
        let object = self.finish(spec, cursor.id)?;
        debug!(spec, id = %object.id.short_hex(), kind = %object.kind, "resolved revision");
        Ok((object, cursor.reference))
    }

    /// Resolve a single revision or an `a..b` / `a...b` range.
    ///
    /// For `a...b`, `from` is the merge base of `a` and `b`.
    pub fn range(&self, spec: &str) -> Result<RevisionSpec> {
        match parse(spec)? {
            Spec::Single(expr) => {
                let from = self.object(spec, &expr)?;
                Ok(RevisionSpec {
                    from,
                    to: None,
                    flags: RevFlags::SINGLE,
                })
            }
            Spec::Range { from, to, symmetric } => {
                let from = self.object(spec, &from)?;
                let to = self.object(spec, &to)?;
                if !symmetric {
                    return Ok(RevisionSpec {
                        from,
                        to: Some(to),
                        flags: RevFlags::RANGE,
                    });
                }
                let base = merge_base(self.graph, &from.id, &to.id)?.ok_or(RevParseError::NoMergeBase {
                    from: from.id,
                    to: to.id,
                })?;
                debug!(spec, base = %base.short_hex(), "resolved symmetric range");
                Ok(RevisionSpec {
                    from: ResolvedObject {
                        id: base,
                        kind: ObjectKind::Commit,
                    },
                    to: Some(to),
                    flags: RevFlags::RANGE | RevFlags::MERGE_BASE,
                })
            }
        }
    }

    fn object(&self, spec: &str, expr: &Expr) -> Result<ResolvedObject> {
        let cursor = self.evaluate(spec, expr)?;
        self.finish(spec, cursor.id)
    }

    fn finish(&self, spec: &str, id: ObjectId) -> Result<ResolvedObject> {
        let kind = self.graph.kind(&id)?.ok_or_else(|| RevParseError::NotFound {
            spec: spec.to_string(),
        })?;
        Ok(ResolvedObject { id, kind })
    }

    fn evaluate(&self, spec: &str, expr: &Expr) -> Result<Cursor> {
        let mut cursor = match &expr.base {
            Base::Name(name) => self.lookup_name(name)?,
            Base::CurrentBranch => self.current_branch()?,
            Base::PreviousCheckout(n) => self.previous_checkout(*n)?,
        };
        for op in &expr.ops {
            cursor = self.apply(spec, cursor, *op)?;
        }
        Ok(cursor)
    }

    fn at_reference(&self, reference: Reference) -> Result<Cursor> {
        let resolved = self.refs.resolve_reference(&reference)?;
        let id = resolved.target_id().ok_or_else(|| RevParseError::NotFound {
            spec: reference.name().to_string(),
        })?;
        Ok(Cursor {
            id,
            reference: Some(reference),
        })
    }

    fn lookup_name(&self, name: &str) -> Result<Cursor> {
        if is_full_hex(name) {
            let id = ObjectId::from_hex(name)?;
            if self.graph.contains(&id)? {
                return Ok(Cursor::object(id));
            }
        }

        match self.refs.dwim(name) {
            Ok(reference) => return self.at_reference(reference),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(id) = self.by_prefix(name)? {
            return Ok(Cursor::object(id));
        }
        if let Some((_, hex)) = name.rsplit_once("-g") {
            if let Some(id) = self.by_prefix(hex)? {
                return Ok(Cursor::object(id));
            }
        }
        Err(RevParseError::NotFound {
            spec: name.to_string(),
        })
    }

    fn by_prefix(&self, text: &str) -> Result<Option<ObjectId>> {
        if !HexPrefix::is_candidate(text) {
            return Ok(None);
        }
        let prefix = HexPrefix::new(text)?;
        let mut matches = self.graph.find_by_prefix(&prefix)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(RevParseError::Ambiguous {
                prefix: prefix.to_string(),
                candidates: matches,
            }),
        }
    }

    /// The branch `HEAD` points at, or `HEAD` itself when detached.
    fn current_branch(&self) -> Result<Cursor> {
        let head = self.refs.head()?;
        let reference = match head.symbolic_target() {
            Some(target) => self.refs.lookup(target)?,
            None => head,
        };
        self.at_reference(reference)
    }

    fn previous_checkout(&self, n: usize) -> Result<Cursor> {
        let entries = self.refs.reflog(HEAD)?;
        let source = entries
            .iter()
            .rev()
            .filter_map(|entry| checkout_source(&entry.message))
            .nth(n - 1)
            .ok_or_else(|| RevParseError::NotFound {
                spec: format!("@{{-{n}}}"),
            })?;

        match self.refs.lookup(&format!("{HEADS_PREFIX}{source}")) {
            Ok(branch) => self.at_reference(branch),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => {
                self.lookup_name(source)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn apply(&self, spec: &str, cursor: Cursor, op: Op) -> Result<Cursor> {
        match op {
            Op::Parent(n) => Ok(Cursor::object(nth_parent(self.graph, &cursor.id, n)?)),
            Op::Ancestor(n) => Ok(Cursor::object(nth_ancestor(self.graph, &cursor.id, n)?)),
            Op::Peel(PeelTarget::Any) => Ok(Cursor::object(peel(self.graph, &cursor.id, None)?.0)),
            Op::Peel(PeelTarget::Kind(kind)) => {
                Ok(Cursor::object(peel(self.graph, &cursor.id, Some(kind))?.0))
            }
            Op::Peel(PeelTarget::Object) => {
                if !self.graph.contains(&cursor.id)? {
                    return Err(RevParseError::NotFound {
                        spec: spec.to_string(),
                    });
                }
                Ok(Cursor::object(cursor.id))
            }
            Op::Reflog(n) => {
                let reference = cursor
                    .reference
                    .ok_or_else(|| invalid(spec, "@{n} needs a reference"))?;
                let id = self.reflog_value(&reference, n, cursor.id)?;
                Ok(Cursor {
                    id,
                    reference: Some(reference),
                })
            }
            Op::Upstream => {
                let reference = cursor
                    .reference
                    .ok_or_else(|| invalid(spec, "@{upstream} needs a branch"))?;
                let resolved = self.refs.resolve_reference(&reference)?;
                let branch = Branch::from_reference(resolved)
                    .filter(Branch::is_local)
                    .ok_or_else(|| invalid(spec, "@{upstream} needs a local branch"))?;
                let upstream = self.branches.upstream(&branch)?;
                self.at_reference(upstream.into_reference())
            }
        }
    }

    /// The value `reference` had `n` changes ago.
    fn reflog_value(&self, reference: &Reference, n: usize, current: ObjectId) -> Result<ObjectId> {
        if n == 0 {
            return Ok(current);
        }
        let entries = self.refs.reflog(reference.name())?;
        let count = entries.len();
        if n < count {
            return Ok(entries[count - 1 - n].new);
        }
        if n == count {
            if let Some(first) = entries.first().filter(|e| !e.old.is_null()) {
                return Ok(first.old);
            }
        }
        Err(RevParseError::ReflogTooShort {
            name: reference.name().to_string(),
            requested: n,
            available: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdb_branch::{BranchKind, InMemoryConfig};
    use refdb_graph::InMemoryGraph;
    use refdb_refs::{InMemoryBackend, StoreConfig};

    /// `C0 <- C1 <- C2 <- C3`, `main` at C3, `HEAD -> main`.
    struct Fixture {
        graph: InMemoryGraph,
        refs: RefStore<InMemoryBackend>,
        config: InMemoryConfig,
        c: Vec<ObjectId>,
    }

    impl Fixture {
        fn new() -> Self {
            let graph = InMemoryGraph::new();
            let c = graph.linear_history(4).unwrap();
            let refs = RefStore::new(InMemoryBackend::new(), StoreConfig::default());
            refs.create("refs/heads/main", c[3], false, "init").unwrap();
            refs.set_head("refs/heads/main").unwrap();
            Self {
                graph,
                refs,
                config: InMemoryConfig::new(),
                c,
            }
        }

        fn resolver(&self) -> Resolver<'_, InMemoryBackend> {
            Resolver::new(&self.refs, &self.graph, &self.config)
        }

        fn id(&self, spec: &str) -> ObjectId {
            self.resolver().single(spec).unwrap().id
        }

        fn code(&self, spec: &str) -> ErrorCode {
            self.resolver().single(spec).unwrap_err().code()
        }
    }

    #[test]
    fn head_tilde_two_on_linear_history() {
        let fx = Fixture::new();
        let resolved = fx.resolver().single("HEAD~2").unwrap();
        assert_eq!(resolved.id, fx.c[1]);
        assert_eq!(resolved.kind, ObjectKind::Commit);
    }

    #[test]
    fn parent_and_ancestor_navigation() {
        let fx = Fixture::new();
        assert_eq!(fx.id("HEAD^"), fx.c[2]);
        assert_eq!(fx.id("HEAD^0"), fx.c[3]);
        assert_eq!(fx.id("HEAD~0"), fx.c[3]);
        assert_eq!(fx.id("HEAD^^~1"), fx.c[0]);
        assert_eq!(fx.id("main~3"), fx.c[0]);
        assert_eq!(fx.id("@~1"), fx.c[2]);
        assert_eq!(fx.code("main~4"), ErrorCode::NotFound);
        assert_eq!(fx.code("HEAD^2"), ErrorCode::NotFound);
    }

    #[test]
    fn merge_parents() {
        let fx = Fixture::new();
        let side = fx.graph.commit(&[fx.c[1]], "side").unwrap();
        let merge = fx.graph.commit(&[fx.c[3], side], "merge").unwrap();
        fx.refs.create("refs/heads/merged", merge, false, "x").unwrap();

        assert_eq!(fx.id("merged^2"), side);
        assert_eq!(fx.id("merged^2~1"), fx.c[1]);
        assert_eq!(fx.id("merged~1"), fx.c[3]);
        assert_eq!(fx.id("merged^1"), fx.c[3]);
    }

    #[test]
    fn peeling_tags() {
        let fx = Fixture::new();
        let tag = fx.graph.tag(fx.c[2], "v1", "release").unwrap();
        fx.refs.create("refs/tags/v1", tag, false, "tag").unwrap();
        let resolver = fx.resolver();

        assert_eq!(resolver.single("v1").unwrap().kind, ObjectKind::Tag);
        assert_eq!(resolver.single("v1^{}").unwrap().id, fx.c[2]);
        assert_eq!(resolver.single("v1^{commit}").unwrap().id, fx.c[2]);
        assert_eq!(resolver.single("v1^{tree}").unwrap().kind, ObjectKind::Tree);
        assert_eq!(resolver.single("v1^{tag}").unwrap().id, tag);
        assert_eq!(resolver.single("v1^{object}").unwrap().id, tag);
        assert_eq!(resolver.single("v1~1").unwrap().id, fx.c[1]);
        assert_eq!(fx.code("main^{blob}"), ErrorCode::TypeMismatch);
        assert_eq!(fx.code("main^{tag}"), ErrorCode::TypeMismatch);
    }

    #[test]
    fn two_dot_range() {
        let fx = Fixture::new();
        let range = fx.resolver().range("main~2..main").unwrap();
        assert_eq!(range.from.id, fx.c[1]);
        assert_eq!(range.to.map(|o| o.id), Some(fx.c[3]));
        assert_eq!(range.flags, RevFlags::RANGE);

        let open = fx.resolver().range("..main~1").unwrap();
        assert_eq!(open.from.id, fx.c[3]);
        assert_eq!(open.to.map(|o| o.id), Some(fx.c[2]));
    }

    #[test]
    fn three_dot_range_uses_merge_base() {
        let fx = Fixture::new();
        let side = fx.graph.commit(&[fx.c[1]], "side").unwrap();
        fx.refs.create("refs/heads/topic", side, false, "x").unwrap();

        let range = fx.resolver().range("main...topic").unwrap();
        assert_eq!(range.from.id, fx.c[1]);
        assert_eq!(range.from.kind, ObjectKind::Commit);
        assert_eq!(range.to.map(|o| o.id), Some(side));
        assert_eq!(range.flags, RevFlags::RANGE | RevFlags::MERGE_BASE);
        assert!(range.flags.contains(RevFlags::MERGE_BASE));
    }

    #[test]
    fn three_dot_range_without_common_history() {
        let fx = Fixture::new();
        let orphan = fx.graph.commit(&[], "orphan").unwrap();
        fx.refs.create("refs/heads/orphan", orphan, false, "x").unwrap();
        let err = fx.resolver().range("main...orphan").unwrap_err();
        assert!(matches!(err, RevParseError::NoMergeBase { .. }));
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn single_revision_through_range() {
        let fx = Fixture::new();
        let spec = fx.resolver().range("main~1").unwrap();
        assert_eq!(spec.from.id, fx.c[2]);
        assert_eq!(spec.to, None);
        assert_eq!(spec.flags, RevFlags::SINGLE);
        assert_eq!(fx.code("main~2..main"), ErrorCode::InvalidSpec);
    }

    #[test]
    fn reflog_lookups() {
        let fx = Fixture::new();
        let work = fx.refs.create("refs/heads/work", fx.c[0], false, "branch").unwrap();
        let work = fx.refs.update_target(&work, fx.c[1], "commit").unwrap();
        fx.refs.update_target(&work, fx.c[2], "commit").unwrap();

        assert_eq!(fx.id("work@{0}"), fx.c[2]);
        assert_eq!(fx.id("work@{1}"), fx.c[1]);
        assert_eq!(fx.id("work@{2}"), fx.c[0]);
        assert_eq!(fx.id("work@{1}~1"), fx.c[0]);
        let err = fx.resolver().single("work@{3}").unwrap_err();
        assert!(matches!(err, RevParseError::ReflogTooShort { available: 3, .. }));

        let (_, reference) = fx.resolver().extended("work@{1}").unwrap();
        assert_eq!(reference.unwrap().name(), "refs/heads/work");

        fx.refs.set_head("refs/heads/work").unwrap();
        assert_eq!(fx.id("@{1}"), fx.c[1]);
        assert_eq!(fx.id("HEAD@{0}"), fx.c[2]);
        assert_eq!(fx.id("HEAD@{1}"), fx.c[3]);
    }

    #[test]
    fn previous_checkouts() {
        let fx = Fixture::new();
        fx.refs.create("refs/heads/topic", fx.c[1], false, "branch").unwrap();
        fx.refs.set_head("refs/heads/topic").unwrap();

        let (object, reference) = fx.resolver().extended("@{-1}").unwrap();
        assert_eq!(object.id, fx.c[3]);
        assert_eq!(reference.unwrap().name(), "refs/heads/main");

        fx.refs.set_head("refs/heads/main").unwrap();
        assert_eq!(fx.id("@{-1}"), fx.c[1]);
        assert_eq!(fx.id("@{-2}"), fx.c[3]);
        assert_eq!(fx.id("@{-1}~1"), fx.c[0]);
        assert_eq!(fx.code("@{-5}"), ErrorCode::NotFound);
    }

    #[test]
    fn upstream_lookups() {
        let fx = Fixture::new();
        fx.refs
            .create("refs/remotes/origin/main", fx.c[2], false, "fetch")
            .unwrap();
        let branches = BranchManager::new(&fx.refs, &fx.graph, &fx.config);
        let main = branches.lookup("main", BranchKind::Local).unwrap();
        branches.set_upstream(&main, Some("origin/main")).unwrap();

        assert_eq!(fx.id("@{u}"), fx.c[2]);
        assert_eq!(fx.id("main@{upstream}"), fx.c[2]);
        assert_eq!(fx.id("HEAD@{u}"), fx.c[2]);
        assert_eq!(fx.id("main@{u}~1"), fx.c[1]);
        let (_, reference) = fx.resolver().extended("@{u}").unwrap();
        assert_eq!(reference.unwrap().name(), "refs/remotes/origin/main");

        fx.refs.create("refs/heads/topic", fx.c[1], false, "x").unwrap();
        assert_eq!(fx.code("topic@{u}"), ErrorCode::NotFound);
        assert_eq!(fx.code("origin/main@{u}"), ErrorCode::InvalidSpec);
    }

    #[test]
    fn object_ids_and_prefixes() {
        let fx = Fixture::new();
        let full = fx.c[0].to_hex();
        let (object, reference) = fx.resolver().extended(&full).unwrap();
        assert_eq!(object.id, fx.c[0]);
        assert!(reference.is_none());

        assert_eq!(fx.id(&fx.c[1].short_hex()), fx.c[1]);
        assert_eq!(fx.id(&fx.c[1].to_hex()[..12].to_uppercase()), fx.c[1]);
        assert_eq!(fx.id(&format!("v1.0-3-g{}", &fx.c[3].to_hex()[..10])), fx.c[3]);
        assert_eq!(fx.id(&format!("{}~1", fx.c[3].short_hex())), fx.c[2]);
    }

    #[test]
    fn references_beat_abbreviated_ids() {
        let fx = Fixture::new();
        let short = fx.c[0].short_hex();
        fx.refs.create(&format!("refs/heads/{short}"), fx.c[2], false, "x").unwrap();
        assert_eq!(fx.id(&short), fx.c[2]);
    }

    #[test]
    fn ambiguous_prefix() {
        let fx = Fixture::new();
        let mut seen = std::collections::HashMap::new();
        let mut prefix = None;
        for i in 0..20_000u32 {
            let id = fx.graph.blob(&i.to_le_bytes()).unwrap();
            let hex = id.to_hex()[..4].to_string();
            if seen.insert(hex.clone(), id).is_some() {
                prefix = Some(hex);
                break;
            }
        }
        let prefix = prefix.unwrap();
        let err = fx.resolver().single(&prefix).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Ambiguous);
    }

    #[test]
    fn extended_reports_reference_only_at_references() {
        let fx = Fixture::new();
        let (_, reference) = fx.resolver().extended("main").unwrap();
        assert_eq!(reference.unwrap().name(), "refs/heads/main");
        let (_, reference) = fx.resolver().extended("HEAD").unwrap();
        assert_eq!(reference.unwrap().name(), "HEAD");
        let (_, reference) = fx.resolver().extended("main~1").unwrap();
        assert!(reference.is_none());
        let (_, reference) = fx.resolver().extended("main^{}").unwrap();
        assert!(reference.is_none());
    }

    #[test]
    fn unknown_and_malformed() {
        let fx = Fixture::new();
        assert_eq!(fx.code("nope"), ErrorCode::NotFound);
        assert_eq!(fx.code("HEAD^{foo}"), ErrorCode::InvalidSpec);
        assert_eq!(fx.code("HEAD:README"), ErrorCode::InvalidSpec);
        assert_eq!(fx.code(""), ErrorCode::InvalidSpec);
        assert_eq!(fx.code(&format!("{}@{{1}}", fx.c[0])), ErrorCode::InvalidSpec);
    }

    #[test]
    fn unborn_head_is_not_found() {
        let fx = Fixture::new();
        fx.refs.set_head("refs/heads/unborn").unwrap();
        assert_eq!(fx.code("HEAD"), ErrorCode::NotFound);
        assert_eq!(fx.code("@{1}"), ErrorCode::NotFound);
    }
}
