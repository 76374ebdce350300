//! Branch values.

use std::fmt;

use refdb_refs::{Reference, HEADS_PREFIX, REMOTES_PREFIX};
use refdb_types::ObjectId;

/// Local (`refs/heads/*`) or remote-tracking (`refs/remotes/*`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BranchKind {
    Local,
    Remote,
}

impl BranchKind {
    /// Namespace prefix of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Local => HEADS_PREFIX,
            Self::Remote => REMOTES_PREFIX,
        }
    }

    /// Full reference name of the branch `name`.
    pub fn full_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix())
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Which branches an iteration yields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BranchFilter {
    Local,
    Remote,
    #[default]
    All,
}

impl BranchFilter {
    pub(crate) fn accepts(&self, kind: BranchKind) -> bool {
        match self {
            Self::Local => kind == BranchKind::Local,
            Self::Remote => kind == BranchKind::Remote,
            Self::All => true,
        }
    }
}

/// A reference known to be a local or remote-tracking branch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    reference: Reference,
    kind: BranchKind,
}

impl Branch {
    /// Wrap `reference` if it lives in a branch namespace.
    pub fn from_reference(reference: Reference) -> Option<Self> {
        let kind = if reference.is_branch() {
            BranchKind::Local
        } else if reference.is_remote() {
            BranchKind::Remote
        } else {
            return None;
        };
        Some(Self { reference, kind })
    }

    /// Name without the namespace: `main`, `origin/main`.
    pub fn name(&self) -> &str {
        let full = self.reference.name();
        full.strip_prefix(self.kind.prefix()).unwrap_or(full)
    }

    /// Full reference name.
    pub fn full_name(&self) -> &str {
        self.reference.name()
    }

    pub fn kind(&self) -> BranchKind {
        self.kind
    }

    pub fn is_local(&self) -> bool {
        self.kind == BranchKind::Local
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn into_reference(self) -> Reference {
        self.reference
    }

    /// The commit the branch points at; `None` for a symbolic remote `HEAD`.
    pub fn target_id(&self) -> Option<ObjectId> {
        self.reference.target_id()
    }
}
