//! The [`BranchManager`]: branch lifecycle and upstream tracking.
//!
//! Branches are plain references under `refs/heads/` and `refs/remotes/`.
//! The manager adds the rules that only make sense for branches (targets
//! must be commits, the checked-out branch is protected) and keeps the
//! `branch.<name>.remote` / `branch.<name>.merge` configuration in step.

use tracing::debug;

use refdb_graph::{GraphError, ObjectGraph};
use refdb_refs::{RefBackend, RefError, RefIter, RefStore, HEADS_PREFIX, REMOTES_PREFIX};
use refdb_types::{ErrorCode, ObjectId, ObjectKind};

use crate::branch::{Branch, BranchFilter, BranchKind};
use crate::config::ConfigStore;
use crate::error::{BranchError, Result};

/// Remote name recorded for an upstream that is a local branch.
pub const LOCAL_REMOTE: &str = ".";

fn section(branch: &str) -> String {
    format!("branch.{branch}")
}

fn remote_key(branch: &str) -> String {
    format!("branch.{branch}.remote")
}

fn merge_key(branch: &str) -> String {
    format!("branch.{branch}.merge")
}

/// Branch operations over a reference store, an object graph, and a
/// configuration store.
pub struct BranchManager<'a, B: RefBackend> {
    refs: &'a RefStore<B>,
    graph: &'a dyn ObjectGraph,
    config: &'a dyn ConfigStore,
}

impl<'a, B: RefBackend> BranchManager<'a, B> {
    pub fn new(refs: &'a RefStore<B>, graph: &'a dyn ObjectGraph, config: &'a dyn ConfigStore) -> Self {
        Self { refs, graph, config }
    }

    pub fn refs(&self) -> &'a RefStore<B> {
        self.refs
    }

    /// Validate a local branch name and return its full reference name.
    fn local_name(&self, name: &str) -> Result<String> {
        let invalid = |reason: String| BranchError::InvalidName {
            name: name.to_string(),
            reason,
        };
        if name == "HEAD" {
            return Err(invalid("'HEAD' is reserved".into()));
        }
        if name.starts_with('-') {
            return Err(invalid("must not start with '-'".into()));
        }
        self.refs
            .normalize(&BranchKind::Local.full_name(name))
            .map_err(|e| invalid(e.to_string()))
    }

    fn is_head_name(&self, full_name: &str) -> Result<bool> {
        match self.refs.head() {
            Ok(head) => Ok(head.symbolic_target() == Some(full_name)),
            Err(RefError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `HEAD` points at `branch`.
    pub fn is_head(&self, branch: &Branch) -> Result<bool> {
        self.is_head_name(branch.full_name())
    }

    /// The local branch `HEAD` points at, if it exists.
    pub fn current(&self) -> Result<Option<Branch>> {
        let head = match self.refs.head() {
            Ok(head) => head,
            Err(RefError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(target) = head.symbolic_target().filter(|t| t.starts_with(HEADS_PREFIX)) else {
            return Ok(None);
        };
        match self.refs.lookup(target) {
            Ok(reference) => Ok(Branch::from_reference(reference)),
            Err(RefError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Name of `branch` without its namespace.
    pub fn name<'b>(&self, branch: &'b Branch) -> &'b str {
        branch.name()
    }

    /// Create the local branch `name` at the commit `target`.
    ///
    /// With `force` an existing branch is reset, unless it is checked out.
    pub fn create(&self, name: &str, target: &ObjectId, force: bool) -> Result<Branch> {
        let full = self.local_name(name)?;
        match self.graph.kind(target)? {
            None => return Err(GraphError::NotFound(*target).into()),
            Some(ObjectKind::Commit) => {}
            Some(kind) => return Err(BranchError::NotACommit { id: *target, kind }),
        }

        let exists = match self.refs.lookup(&full) {
            Ok(_) => true,
            Err(RefError::NotFound { .. }) => false,
            Err(e) => return Err(e.into()),
        };
        if exists && force && self.is_head_name(&full)? {
            return Err(BranchError::CheckedOut { name: name.to_string() });
        }

        let message = if exists && force {
            format!("branch: Reset to {}", target.short_hex())
        } else {
            format!("branch: Created from {}", target.short_hex())
        };
        let reference = self.refs.create(&full, *target, force, &message)?;
        debug!(branch = name, target = %target.short_hex(), "created branch");
        Branch::from_reference(reference).ok_or_else(|| BranchError::NotLocal { name: full })
    }

    /// Look up a branch by its short name.
    pub fn lookup(&self, name: &str, kind: BranchKind) -> Result<Branch> {
        let reference = self.refs.lookup(&kind.full_name(name))?;
        Branch::from_reference(reference).ok_or_else(|| BranchError::InvalidName {
            name: name.to_string(),
            reason: format!("not a {kind} branch"),
        })
    }

    /// Delete `branch` and, for a local branch, its configuration section.
    pub fn delete(&self, branch: &Branch) -> Result<()> {
        if self.is_head(branch)? {
            return Err(BranchError::CheckedOut {
                name: branch.name().to_string(),
            });
        }
        self.refs.delete(branch.reference())?;
        if branch.is_local() {
            self.config.remove_section(&section(branch.name()))?;
        }
        debug!(branch = branch.name(), kind = %branch.kind(), "deleted branch");
        Ok(())
    }

    /// Rename a local branch. Its upstream configuration moves with it and
    /// `HEAD` follows if it pointed at the old name.
    pub fn rename(&self, branch: &Branch, new_name: &str, force: bool) -> Result<Branch> {
        if !branch.is_local() {
            return Err(BranchError::NotLocal {
                name: branch.full_name().to_string(),
            });
        }
        let new_full = self.local_name(new_name)?;
        if new_full != branch.full_name() && force && self.is_head_name(&new_full)? {
            return Err(BranchError::CheckedOut {
                name: new_name.to_string(),
            });
        }

        let message = format!("branch: renamed {} to {}", branch.full_name(), new_full);
        let renamed = self.refs.rename(branch.reference(), &new_full, force, &message)?;
        let renamed = Branch::from_reference(renamed).ok_or_else(|| BranchError::NotLocal {
            name: new_full.clone(),
        })?;

        if renamed.name() != branch.name() {
            let new_section = section(renamed.name());
            self.config.remove_section(&new_section)?;
            self.config.rename_section(&section(branch.name()), &new_section)?;
        }
        debug!(from = branch.name(), to = renamed.name(), "renamed branch");
        Ok(renamed)
    }

    /// Iterate branches of the kinds `filter` accepts, sorted by full name.
    pub fn iter(&self, filter: BranchFilter) -> Result<BranchIter<'a>> {
        let glob = match filter {
            BranchFilter::Local => "refs/heads/*",
            BranchFilter::Remote => "refs/remotes/*",
            BranchFilter::All => "refs/*",
        };
        let refs: &'a RefStore<B> = self.refs;
        Ok(BranchIter {
            inner: refs.iter(Some(glob))?,
            filter,
        })
    }

    /// The remote a remote-tracking branch belongs to:
    /// `refs/remotes/origin/main` is on `origin`.
    pub fn remote_name(&self, remote_branch: &str) -> Result<String> {
        let not_remote = || BranchError::NotRemote {
            name: remote_branch.to_string(),
        };
        let rest = remote_branch.strip_prefix(REMOTES_PREFIX).ok_or_else(not_remote)?;
        match rest.split_once('/') {
            Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => Ok(remote.to_string()),
            _ => Err(not_remote()),
        }
    }

    /// Set or clear the upstream of a local branch.
    ///
    /// `upstream` is a short branch name; local branches are tried before
    /// remote-tracking ones. A local upstream is recorded with remote `.`.
    pub fn set_upstream(&self, branch: &Branch, upstream: Option<&str>) -> Result<()> {
        if !branch.is_local() {
            return Err(BranchError::NotLocal {
                name: branch.full_name().to_string(),
            });
        }
        let name = branch.name();

        let Some(upstream) = upstream else {
            self.config.remove(&remote_key(name))?;
            self.config.remove(&merge_key(name))?;
            debug!(branch = name, "cleared upstream");
            return Ok(());
        };

        let (remote, merge) = match self.lookup(upstream, BranchKind::Local) {
            Ok(local) => (LOCAL_REMOTE.to_string(), local.full_name().to_string()),
            Err(e) if e.code() == ErrorCode::NotFound => {
                let tracking = self.lookup(upstream, BranchKind::Remote)?;
                let remote = self.remote_name(tracking.full_name())?;
                let rest = tracking
                    .name()
                    .strip_prefix(remote.as_str())
                    .and_then(|r| r.strip_prefix('/'))
                    .unwrap_or_default();
                (remote, format!("{HEADS_PREFIX}{rest}"))
            }
            Err(e) => return Err(e),
        };

        self.config.set(&remote_key(name), &remote)?;
        self.config.set(&merge_key(name), &merge)?;
        debug!(branch = name, remote = %remote, merge = %merge, "set upstream");
        Ok(())
    }

    /// Full reference name of the upstream of a local branch.
    pub fn upstream_name(&self, branch: &Branch) -> Result<String> {
        if !branch.is_local() {
            return Err(BranchError::NotLocal {
                name: branch.full_name().to_string(),
            });
        }
        let name = branch.name();
        let no_upstream = || BranchError::NoUpstream { name: name.to_string() };
        let remote = self.config.get(&remote_key(name))?.ok_or_else(no_upstream)?;
        let merge = self.config.get(&merge_key(name))?.ok_or_else(no_upstream)?;

        if remote == LOCAL_REMOTE {
            return Ok(merge);
        }
        let rest = merge.strip_prefix(HEADS_PREFIX).unwrap_or(&merge);
        Ok(format!("{REMOTES_PREFIX}{remote}/{rest}"))
    }

    /// The upstream branch of a local branch.
    pub fn upstream(&self, branch: &Branch) -> Result<Branch> {
        let name = self.upstream_name(branch)?;
        let reference = self.refs.lookup(&name)?;
        Branch::from_reference(reference).ok_or_else(|| BranchError::NoUpstream {
            name: branch.name().to_string(),
        })
    }
}

/// Iterator returned by [`BranchManager::iter`].
pub struct BranchIter<'a> {
    inner: RefIter<'a>,
    filter: BranchFilter,
}

impl Iterator for BranchIter<'_> {
    type Item = Result<Branch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Err(e) => return Some(Err(e.into())),
                Ok(reference) => {
                    if let Some(branch) = Branch::from_reference(reference) {
                        if self.filter.accepts(branch.kind()) {
                            return Some(Ok(branch));
                        }
                    }
                }
            }
        }
    }
}
