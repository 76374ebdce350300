//! The reference store.
//!
//! [`RefStore`] owns a [`RefBackend`] and layers the naming rules, symbolic
//! resolution, logging policy and compare-and-swap semantics on top of it.
//! Every mutation runs under per-name locks and reaches the backend as a
//! single [`RefUpdate`], so a reference and its log entries change together.

use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;

use tracing::{debug, warn};

use refdb_types::ObjectId;

use crate::backend::{self, LogAppend, RefBackend, RefUpdate};
use crate::config::StoreConfig;
use crate::dwim;
use crate::error::{RefError, Result};
use crate::iter::{NameGlob, RefIter};
use crate::lock::{NameGuard, NameLocks};
use crate::names::{normalize_name, NameOptions};
use crate::types::{shorthand, RefLogEntry, Reference, Target, HEAD};

/// A reference store over backend `B`.
///
/// `RefStore` is `Send + Sync`; share it with `Arc` when several threads
/// mutate references.
pub struct RefStore<B: RefBackend> {
    backend: B,
    config: StoreConfig,
    locks: NameLocks,
}

impl<B: RefBackend> RefStore<B> {
    pub fn new(backend: B, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            locks: NameLocks::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn name_options(&self) -> NameOptions {
        NameOptions::new().allow_one_level(self.config.allow_one_level)
    }

    /// Validate `name` under this store's rules and return its normal form.
    pub fn normalize(&self, name: &str) -> Result<String> {
        normalize_name(name, self.name_options())
    }

    fn null_id(&self) -> ObjectId {
        ObjectId::null(self.config.object_format)
    }

    fn read_existing(&self, name: &str) -> Result<Reference> {
        self.backend.read(name)?.ok_or_else(|| RefError::not_found(name))
    }

    // ---- reads ----

    /// Look up a reference by full name without following symbolic targets.
    pub fn lookup(&self, name: &str) -> Result<Reference> {
        let name = self.normalize(name)?;
        self.read_existing(&name)
    }

    /// Look up `name` and follow symbolic targets down to a direct reference.
    pub fn resolve(&self, name: &str) -> Result<Reference> {
        let reference = self.lookup(name)?;
        self.resolve_reference(&reference)
    }

    /// Follow `reference` down to a direct reference.
    ///
    /// Fails with [`RefError::Cycle`] when a name repeats or the chain is
    /// longer than `max_symbolic_depth` hops.
    pub fn resolve_reference(&self, reference: &Reference) -> Result<Reference> {
        let mut current = reference.clone();
        let mut visited = HashSet::from([reference.name().to_string()]);
        let mut depth = 0;

        while let Target::Symbolic(next) = current.target() {
            let next = next.clone();
            depth += 1;
            if depth > self.config.max_symbolic_depth || !visited.insert(next.clone()) {
                return Err(RefError::Cycle {
                    name: reference.name().to_string(),
                    depth,
                });
            }
            current = self.read_existing(&next)?;
        }
        Ok(current)
    }

    /// The object id `name` ultimately points at.
    pub fn name_to_id(&self, name: &str) -> Result<ObjectId> {
        let resolved = self.resolve(name)?;
        resolved.target_id().ok_or_else(|| RefError::TypeMismatch {
            name: resolved.name().to_string(),
            expected: "direct",
        })
    }

    /// What `name` resolves to right now, or the null id when it is missing,
    /// unborn, or part of a cycle. Used for reflog bookkeeping only.
    fn resolved_id_or_null(&self, name: &str) -> Result<ObjectId> {
        let Some(reference) = self.backend.read(name)? else {
            return Ok(self.null_id());
        };
        match self.resolve_reference(&reference) {
            Ok(resolved) => Ok(resolved.target_id().unwrap_or(self.null_id())),
            Err(RefError::NotFound { .. } | RefError::Cycle { .. }) => Ok(self.null_id()),
            Err(e) => Err(e),
        }
    }

    /// The `HEAD` reference, unresolved.
    pub fn head(&self) -> Result<Reference> {
        self.read_existing(HEAD)
    }

    // ---- logging ----

    fn should_log(&self, name: &str) -> Result<bool> {
        Ok(self.config.log_updates.covers(name) || self.backend.has_log(name)?)
    }

    fn log_for(&self, name: &str, old: ObjectId, new: ObjectId, message: &str) -> Result<Vec<LogAppend>> {
        if !self.should_log(name)? {
            return Ok(Vec::new());
        }
        Ok(vec![LogAppend {
            name: name.to_string(),
            entry: RefLogEntry {
                old,
                new,
                committer: self.config.committer.signature(),
                message: message.to_string(),
            },
        }])
    }

    /// Log entries for `name`, plus the same transition for `HEAD` when
    /// `HEAD` points at `name`. The guard must hold `HEAD`.
    fn logs_with_head(
        &self,
        guard: &NameGuard<'_>,
        name: &str,
        old: ObjectId,
        new: ObjectId,
        message: &str,
    ) -> Result<Vec<LogAppend>> {
        debug_assert!(guard.holds(HEAD));
        let mut logs = self.log_for(name, old, new, message)?;
        if name != HEAD {
            if let Some(head) = self.backend.read(HEAD)? {
                if head.symbolic_target() == Some(name) {
                    logs.extend(self.log_for(HEAD, old, new, message)?);
                }
            }
        }
        Ok(logs)
    }

    /// Create an empty log for `name`, so every later update is logged.
    pub fn ensure_log(&self, name: &str) -> Result<()> {
        let name = self.normalize(name)?;
        self.backend.create_log(&name)
    }

    /// The log of `name`, oldest entry first.
    pub fn reflog(&self, name: &str) -> Result<Vec<RefLogEntry>> {
        let name = self.normalize(name)?;
        self.backend.read_log(&name)
    }

    pub fn has_log(&self, name: &str) -> Result<bool> {
        let name = self.normalize(name)?;
        self.backend.has_log(&name)
    }

    // ---- mutation helpers ----

    /// `refs/heads/a` and `refs/heads/a/b` cannot both exist. Backends
    /// repeat the check while applying the update.
    fn check_hierarchy(&self, name: &str) -> Result<()> {
        let names = self.backend.names()?;
        backend::check_hierarchy(name, names.iter().map(String::as_str))
    }

    /// The current value of `name` if overwriting it is allowed.
    fn prepare_create(&self, name: &str, force: bool) -> Result<Option<Reference>> {
        let existing = self.backend.read(name)?;
        match existing {
            Some(_) if !force => Err(RefError::AlreadyExists {
                name: name.to_string(),
            }),
            Some(_) => Ok(existing),
            None => {
                self.check_hierarchy(name)?;
                Ok(None)
            }
        }
    }

    fn create_direct(
        &self,
        name: &str,
        id: ObjectId,
        force: bool,
        expected_current: Option<ObjectId>,
        message: Option<&str>,
    ) -> Result<Reference> {
        let name = self.normalize(name)?;
        let guard = self.locks.lock([name.as_str(), HEAD])?;
        let existing = self.prepare_create(&name, force)?;

        if let Some(expected) = expected_current {
            let actual = existing.as_ref().and_then(Reference::target_id);
            if actual != Some(expected) {
                return Err(RefError::Conflict {
                    name,
                    expected: expected.to_string(),
                    actual: existing.map_or_else(|| "nothing".to_string(), |r| r.target().to_string()),
                });
            }
        }

        let target = Target::Direct(id);
        let message = match message {
            Some(message) => message.to_string(),
            None => transition_message(&name, existing.as_ref().map(Reference::target), &target),
        };
        let old = self.resolved_id_or_null(&name)?;
        let reference = Reference::direct(&name, id);
        let logs = self.logs_with_head(&guard, &name, old, id, &message)?;
        self.backend.apply(RefUpdate::Write {
            reference: reference.clone(),
            expected: existing.map(|r| r.target().clone()),
            logs,
        })?;

        debug!(name = %name, id = %id.short_hex(), "created ref");
        Ok(reference)
    }

    // ---- mutations ----

    /// Create a direct reference.
    ///
    /// An existing reference is an error unless `force`, in which case it is
    /// replaced outright (its peeled value is not carried over).
    pub fn create(&self, name: &str, id: ObjectId, force: bool, message: &str) -> Result<Reference> {
        self.create_direct(name, id, force, None, Some(message))
    }

    /// Like [`create`](Self::create), but when `expected_current` is given
    /// the reference must currently point directly at it.
    pub fn create_matching(
        &self,
        name: &str,
        id: ObjectId,
        force: bool,
        expected_current: Option<ObjectId>,
        message: &str,
    ) -> Result<Reference> {
        self.create_direct(name, id, force, expected_current, Some(message))
    }

    /// Create a symbolic reference pointing at `target`.
    ///
    /// `target` must be a valid name but need not exist yet. Without a
    /// message the log records `checkout: moving from A to B` for `HEAD`.
    pub fn create_symbolic(
        &self,
        name: &str,
        target: &str,
        force: bool,
        message: Option<&str>,
    ) -> Result<Reference> {
        let name = self.normalize(name)?;
        let target = self.normalize(target)?;
        let _guard = self.locks.lock([name.as_str()])?;
        let existing = self.prepare_create(&name, force)?;

        let new_target = Target::Symbolic(target.clone());
        let message = match message {
            Some(message) => message.to_string(),
            None => transition_message(&name, existing.as_ref().map(Reference::target), &new_target),
        };
        let old = self.resolved_id_or_null(&name)?;
        let new = self.resolved_id_or_null(&target)?;
        let reference = Reference::symbolic(&name, &target);
        let logs = self.log_for(&name, old, new, &message)?;
        self.backend.apply(RefUpdate::Write {
            reference: reference.clone(),
            expected: existing.map(|r| r.target().clone()),
            logs,
        })?;

        debug!(name = %name, target = %target, "created symbolic ref");
        Ok(reference)
    }

    /// Point the direct reference `existing` at `new_id`.
    ///
    /// `existing` is the caller's snapshot: if the stored value has changed
    /// since, the update fails with [`RefError::Conflict`] and nothing is
    /// written.
    pub fn update_target(&self, existing: &Reference, new_id: ObjectId, message: &str) -> Result<Reference> {
        let Target::Direct(old) = *existing.target() else {
            return Err(RefError::TypeMismatch {
                name: existing.name().to_string(),
                expected: "direct",
            });
        };
        let name = existing.name();
        let guard = self.locks.lock([name, HEAD])?;
        let current = self.read_existing(name)?;
        check_snapshot(existing, &current)?;

        let reference = Reference::direct(name, new_id);
        let logs = self.logs_with_head(&guard, name, old, new_id, message)?;
        self.backend.apply(RefUpdate::Write {
            reference: reference.clone(),
            expected: Some(current.target().clone()),
            logs,
        })?;

        debug!(name, old = %old.short_hex(), new = %new_id.short_hex(), "updated ref");
        Ok(reference)
    }

    /// Point the symbolic reference `existing` at another name.
    pub fn update_symbolic_target(
        &self,
        existing: &Reference,
        new_target: &str,
        message: Option<&str>,
    ) -> Result<Reference> {
        if !existing.target().is_symbolic() {
            return Err(RefError::TypeMismatch {
                name: existing.name().to_string(),
                expected: "symbolic",
            });
        }
        let new_target = self.normalize(new_target)?;
        let name = existing.name();
        let _guard = self.locks.lock([name])?;
        let current = self.read_existing(name)?;
        check_snapshot(existing, &current)?;

        let target = Target::Symbolic(new_target.clone());
        let message = match message {
            Some(message) => message.to_string(),
            None => transition_message(name, Some(current.target()), &target),
        };
        let old = self.resolved_id_or_null(name)?;
        let new = self.resolved_id_or_null(&new_target)?;
        let reference = Reference::symbolic(name, &new_target);
        let logs = self.log_for(name, old, new, &message)?;
        self.backend.apply(RefUpdate::Write {
            reference: reference.clone(),
            expected: Some(current.target().clone()),
            logs,
        })?;

        debug!(name, target = %new_target, "retargeted symbolic ref");
        Ok(reference)
    }

    /// Rename `existing` to `new_name`.
    ///
    /// The log moves with the reference when there is one and gets a rename
    /// entry; no log is created otherwise. `HEAD` follows the rename in the
    /// same backend update, so a failure leaves the old name and `HEAD`
    /// untouched.
    pub fn rename(&self, existing: &Reference, new_name: &str, force: bool, message: &str) -> Result<Reference> {
        let new_name = self.normalize(new_name)?;
        let from = existing.name();
        let guard = self.locks.lock([from, new_name.as_str(), HEAD])?;
        let current = self.read_existing(from)?;
        check_snapshot(existing, &current)?;
        if new_name == from {
            return Ok(current);
        }
        let displaced = self.prepare_create(&new_name, force)?;

        let renamed = current.renamed(&new_name);
        let id = self.resolved_id_or_null(from)?;
        let mut logs = Vec::new();
        if self.backend.has_log(from)? {
            logs.push(LogAppend {
                name: new_name.clone(),
                entry: RefLogEntry {
                    old: id,
                    new: id,
                    committer: self.config.committer.signature(),
                    message: message.to_string(),
                },
            });
        }
        let follow = self.head_follower(&guard, from, &new_name)?;
        if follow.is_some() {
            logs.extend(self.log_for(HEAD, id, id, message)?);
        }

        self.backend.apply(RefUpdate::Rename {
            from: from.to_string(),
            expected: current.target().clone(),
            reference: renamed.clone(),
            displaced: displaced.map(|r| r.target().clone()),
            follow,
            logs,
        })?;
        debug!(from, to = %new_name, "renamed ref");
        Ok(renamed)
    }

    /// The new value of `HEAD` when it points at `from`, which is being
    /// renamed to `to`.
    fn head_follower(&self, guard: &NameGuard<'_>, from: &str, to: &str) -> Result<Option<Reference>> {
        debug_assert!(guard.holds(HEAD));
        if from == HEAD || to == HEAD {
            return Ok(None);
        }
        let follows = self
            .backend
            .read(HEAD)?
            .is_some_and(|head| head.symbolic_target() == Some(from));
        Ok(follows.then(|| Reference::symbolic(HEAD, to)))
    }

    /// Delete `reference` and its log.
    ///
    /// The snapshot stays usable as a value; the store forgets the name.
    pub fn delete(&self, reference: &Reference) -> Result<()> {
        let name = reference.name();
        let _guard = self.locks.lock([name])?;
        let current = self.read_existing(name)?;
        check_snapshot(reference, &current)?;
        self.backend.apply(RefUpdate::Delete {
            name: name.to_string(),
            expected: current.target().clone(),
        })?;
        debug!(name, "deleted ref");
        Ok(())
    }

    /// Record the peeled value of a tag reference. Not logged.
    pub fn set_peeled(&self, reference: &Reference, peeled: Option<ObjectId>) -> Result<Reference> {
        let name = reference.name();
        let _guard = self.locks.lock([name])?;
        let current = self.read_existing(name)?;
        check_snapshot(reference, &current)?;
        let expected = Some(current.target().clone());
        let updated = current.with_peeled(peeled);
        self.backend.apply(RefUpdate::Write {
            reference: updated.clone(),
            expected,
            logs: Vec::new(),
        })?;
        Ok(updated)
    }

    /// Point `HEAD` at `target` (usually a branch, which may be unborn).
    pub fn set_head(&self, target: &str) -> Result<Reference> {
        self.create_symbolic(HEAD, target, true, None)
    }

    /// Detach `HEAD` at `id`.
    pub fn set_head_detached(&self, id: ObjectId) -> Result<Reference> {
        self.create_direct(HEAD, id, true, None, None)
    }

    // ---- enumeration ----

    /// Every reference name, sorted.
    pub fn names(&self) -> Result<BTreeSet<String>> {
        Ok(self.backend.names()?.into_iter().collect())
    }

    /// Iterate references, optionally filtered by a shell glob in which `*`
    /// also matches `/`.
    pub fn iter(&self, glob: Option<&str>) -> Result<RefIter<'_>> {
        let glob = glob.map(NameGlob::new).transpose()?;
        RefIter::new(&self.backend, glob.as_ref())
    }

    /// Visit every reference until the callback breaks.
    ///
    /// `Break(code)` surfaces as [`RefError::UserAborted`] with that code.
    pub fn foreach<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(&Reference) -> ControlFlow<i32>,
    {
        self.visit(None, callback)
    }

    /// [`foreach`](Self::foreach) restricted to names matching `pattern`.
    pub fn foreach_glob<F>(&self, pattern: &str, callback: F) -> Result<()>
    where
        F: FnMut(&Reference) -> ControlFlow<i32>,
    {
        self.visit(Some(pattern), callback)
    }

    fn visit<F>(&self, glob: Option<&str>, mut callback: F) -> Result<()>
    where
        F: FnMut(&Reference) -> ControlFlow<i32>,
    {
        for reference in self.iter(glob)? {
            if let ControlFlow::Break(code) = callback(&reference?) {
                return Err(RefError::UserAborted { code });
            }
        }
        Ok(())
    }

    /// Visit every name without reading the references.
    pub fn foreach_name<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(&str) -> ControlFlow<i32>,
    {
        for name in self.backend.names()? {
            if let ControlFlow::Break(code) = callback(&name) {
                return Err(RefError::UserAborted { code });
            }
        }
        Ok(())
    }

    /// Expand a shorthand to the reference it names.
    ///
    /// Candidates are tried in [`DWIM_RULES`](crate::dwim::DWIM_RULES) order
    /// and the first one that resolves wins. With `strict_shorthand` more
    /// than one resolvable candidate is [`RefError::Ambiguous`].
    ///
    /// Dangling and cyclic candidates are skipped. When nothing resolves and
    /// some candidate was cyclic, that cycle is the error rather than
    /// [`RefError::NotFound`].
    pub fn dwim(&self, short: &str) -> Result<Reference> {
        let mut found = Vec::new();
        let mut cycle = None;
        for candidate in dwim::expand(short, self.name_options()) {
            let Some(reference) = self.backend.read(&candidate)? else {
                continue;
            };
            match self.resolve_reference(&reference) {
                Ok(_) => {}
                Err(RefError::NotFound { .. }) => continue,
                Err(e @ RefError::Cycle { .. }) => {
                    warn!(candidate = %candidate, "skipping cyclic shorthand candidate");
                    cycle.get_or_insert(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
            if !self.config.strict_shorthand {
                return Ok(reference);
            }
            found.push(reference);
        }

        if found.len() > 1 {
            return Err(RefError::Ambiguous {
                name: short.to_string(),
                candidates: found.iter().map(|r| r.name().to_string()).collect(),
            });
        }
        match (found.pop(), cycle) {
            (Some(reference), _) => Ok(reference),
            (None, Some(cycle)) => Err(cycle),
            (None, None) => Err(RefError::not_found(short)),
        }
    }
}

fn check_snapshot(expected: &Reference, current: &Reference) -> Result<()> {
    if current.target() != expected.target() {
        return Err(RefError::Conflict {
            name: expected.name().to_string(),
            expected: expected.target().to_string(),
            actual: current.target().to_string(),
        });
    }
    Ok(())
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::Direct(id) => id.to_hex(),
        Target::Symbolic(name) => shorthand(name).to_string(),
    }
}

/// Default log message for a change of `name` from `old` to `new`.
fn transition_message(name: &str, old: Option<&Target>, new: &Target) -> String {
    let verb = if name == HEAD { "checkout" } else { "symbolic-ref" };
    match old {
        Some(old) => format!(
            "{verb}: moving from {} to {}",
            describe_target(old),
            describe_target(new)
        ),
        None => format!("{verb}: starting at {}", describe_target(new)),
    }
}
