//! Per-name locks serializing mutations inside one process.
//!
//! A guard owns a set of names. Acquisition is all-or-nothing: the caller
//! waits until none of the requested names is held, then takes them all, so
//! two multi-name operations can never deadlock on each other.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex};

use crate::error::{RefError, Result};

#[derive(Debug, Default)]
pub(crate) struct NameLocks {
    held: Mutex<BTreeSet<String>>,
    released: Condvar,
}

impl NameLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Block until every name in `names` is free, then hold them all.
    pub(crate) fn lock<'a, I, S>(&'a self, names: I) -> Result<NameGuard<'a>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let mut held = self.held.lock().map_err(RefError::poisoned)?;
        while wanted.iter().any(|name| held.contains(name)) {
            held = self.released.wait(held).map_err(RefError::poisoned)?;
        }
        held.extend(wanted.iter().cloned());
        Ok(NameGuard {
            locks: self,
            names: wanted,
        })
    }
}

/// Names held until drop.
#[derive(Debug)]
pub(crate) struct NameGuard<'a> {
    locks: &'a NameLocks,
    names: BTreeSet<String>,
}

impl NameGuard<'_> {
    pub(crate) fn holds(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        // A poisoned set still has to let waiters go.
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for name in &self.names {
            held.remove(name);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_releases_on_drop() {
        let locks = NameLocks::new();
        {
            let guard = locks.lock(["refs/heads/a", "HEAD"]).unwrap();
            assert!(guard.holds("HEAD"));
            assert!(!guard.holds("refs/heads/b"));
        }
        let again = locks.lock(["HEAD"]).unwrap();
        assert!(again.holds("HEAD"));
    }

    #[test]
    fn disjoint_names_do_not_block() {
        let locks = NameLocks::new();
        let _a = locks.lock(["refs/heads/a"]).unwrap();
        let _b = locks.lock(["refs/heads/b"]).unwrap();
    }

    #[test]
    fn overlapping_holders_are_exclusive() {
        let locks = Arc::new(NameLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    let names = if i % 2 == 0 {
                        vec!["refs/heads/a", "HEAD"]
                    } else {
                        vec!["HEAD", "refs/heads/b"]
                    };
                    for _ in 0..50 {
                        let _guard = locks.lock(names.clone()).unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
