//! Lazy iteration over a point-in-time snapshot of reference names.

use glob::{MatchOptions, Pattern};

use crate::backend::RefBackend;
use crate::error::{RefError, Result};
use crate::types::Reference;

/// `*` crosses `/`, so `refs/*` matches every ref below `refs/`.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A compiled shell-style name filter.
#[derive(Clone, Debug)]
pub struct NameGlob(Pattern);

impl NameGlob {
    pub fn new(pattern: &str) -> Result<Self> {
        Pattern::new(pattern)
            .map(Self)
            .map_err(|e| RefError::InvalidGlob {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.matches_with(name, GLOB_OPTIONS)
    }
}

/// Iterator returned by [`RefStore::iter`](crate::RefStore::iter).
///
/// The name list is captured when the iterator is created; each reference is
/// read when it is reached. Names deleted in between are skipped.
pub struct RefIter<'a> {
    backend: &'a dyn RefBackend,
    names: std::vec::IntoIter<String>,
}

impl<'a> RefIter<'a> {
    pub(crate) fn new(backend: &'a dyn RefBackend, glob: Option<&NameGlob>) -> Result<Self> {
        let mut names = backend.names()?;
        if let Some(glob) = glob {
            names.retain(|name| glob.matches(name));
        }
        Ok(Self {
            backend,
            names: names.into_iter(),
        })
    }

    /// Names not yet visited.
    pub fn remaining(&self) -> usize {
        self.names.len()
    }
}

impl Iterator for RefIter<'_> {
    type Item = Result<Reference>;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            match self.backend.read(&name) {
                Ok(Some(reference)) => return Some(Ok(reference)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
