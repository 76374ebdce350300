//! Core reference types.
//!
//! A [`Reference`] is an immutable snapshot: the store hands out values, and
//! every mutation produces a new value rather than editing one in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use refdb_types::{ObjectId, Signature};

/// Name of the reference that tracks the checked-out branch.
pub const HEAD: &str = "HEAD";

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const NOTES_PREFIX: &str = "refs/notes/";
pub const REFS_PREFIX: &str = "refs/";

/// What a reference points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Bound straight to an object.
    Direct(ObjectId),
    /// Bound to another reference by name.
    Symbolic(String),
}

impl Target {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(id) => write!(f, "{id}"),
            Self::Symbolic(name) => write!(f, "ref: {name}"),
        }
    }
}

/// A named reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    name: String,
    target: Target,
    /// Cached result of peeling an annotated tag target.
    peeled: Option<ObjectId>,
}

impl Reference {
    pub fn direct(name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            name: name.into(),
            target: Target::Direct(id),
            peeled: None,
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: Target::Symbolic(target.into()),
            peeled: None,
        }
    }

    /// A copy of this reference with the peeled id set.
    pub fn with_peeled(mut self, peeled: Option<ObjectId>) -> Self {
        self.peeled = peeled;
        self
    }

    /// A copy of this reference under another name.
    pub(crate) fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: self.target.clone(),
            peeled: self.peeled,
        }
    }

    /// Full name, e.g. `refs/heads/main`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The object id, if this is a direct reference.
    pub fn target_id(&self) -> Option<ObjectId> {
        match &self.target {
            Target::Direct(id) => Some(*id),
            Target::Symbolic(_) => None,
        }
    }

    /// The referenced name, if this is a symbolic reference.
    pub fn symbolic_target(&self) -> Option<&str> {
        match &self.target {
            Target::Direct(_) => None,
            Target::Symbolic(name) => Some(name),
        }
    }

    pub fn peeled(&self) -> Option<ObjectId> {
        self.peeled
    }

    pub fn is_branch(&self) -> bool {
        self.name.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.name.starts_with(TAGS_PREFIX)
    }

    pub fn is_remote(&self) -> bool {
        self.name.starts_with(REMOTES_PREFIX)
    }

    pub fn is_note(&self) -> bool {
        self.name.starts_with(NOTES_PREFIX)
    }

    /// Human-readable short form of the name.
    pub fn shorthand(&self) -> &str {
        shorthand(&self.name)
    }
}

/// Strip the well-known namespace prefix from a full reference name.
pub fn shorthand(name: &str) -> &str {
    [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX, REFS_PREFIX]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// One transition in a reference's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLogEntry {
    /// Target before the change (null when the reference was created).
    pub old: ObjectId,
    /// Target after the change (null for symbolic updates).
    pub new: ObjectId,
    pub committer: Signature,
    pub message: String,
}

impl fmt::Display for RefLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\t{}", self.old, self.new, self.committer, self.message)
    }
}
