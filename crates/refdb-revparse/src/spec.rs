//! Resolution results.

use std::fmt;
use std::ops::BitOr;

use refdb_types::{ObjectId, ObjectKind};

/// How a [`RevisionSpec`] was written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RevFlags(u8);

impl RevFlags {
    /// A single revision.
    pub const SINGLE: Self = Self(1);
    /// `a..b`.
    pub const RANGE: Self = Self(2);
    /// `a...b`; `from` is the merge base.
    pub const MERGE_BASE: Self = Self(4);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RevFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An object id together with its kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
}

impl fmt::Display for ResolvedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// The result of [`Resolver::range`](crate::Resolver::range).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionSpec {
    pub from: ResolvedObject,
    pub to: Option<ResolvedObject>,
    pub flags: RevFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine() {
        let flags = RevFlags::RANGE | RevFlags::MERGE_BASE;
        assert_eq!(flags.bits(), 6);
        assert!(flags.contains(RevFlags::RANGE));
        assert!(flags.contains(RevFlags::MERGE_BASE));
        assert!(!flags.contains(RevFlags::SINGLE));
        assert_eq!(RevFlags::SINGLE.bits(), 1);
    }
}
