//! In-memory reference backend for testing and ephemeral use.
//!
//! [`InMemoryBackend`] keeps refs and logs in one `HashMap` pair behind a
//! single `RwLock`, so every [`RefUpdate`] is applied under one write guard
//! and is trivially atomic.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::backend::{check_expected, check_hierarchy, LogAppend, RefBackend, RefUpdate};
use crate::error::{RefError, Result};
use crate::types::{RefLogEntry, Reference, Target};

#[derive(Debug, Default)]
struct State {
    refs: HashMap<String, Reference>,
    logs: HashMap<String, Vec<RefLogEntry>>,
}

impl State {
    fn append_logs(&mut self, logs: Vec<LogAppend>) {
        for LogAppend { name, entry } in logs {
            self.logs.entry(name).or_default().push(entry);
        }
    }
}

/// An in-memory implementation of [`RefBackend`].
///
/// Data is lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefBackend for InMemoryBackend {
    fn read(&self, name: &str) -> Result<Option<Reference>> {
        let state = self.state.read().map_err(RefError::poisoned)?;
        Ok(state.refs.get(name).cloned())
    }

    fn names(&self) -> Result<Vec<String>> {
        let state = self.state.read().map_err(RefError::poisoned)?;
        let mut names: Vec<String> = state.refs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn apply(&self, update: RefUpdate) -> Result<()> {
        let mut state = self.state.write().map_err(RefError::poisoned)?;
        match update {
            RefUpdate::Write {
                reference,
                expected,
                logs,
            } => {
                let name = reference.name();
                check_expected(name, expected.as_ref(), state.refs.get(name))?;
                if expected.is_none() {
                    check_hierarchy(name, state.refs.keys().map(String::as_str))?;
                }
                state.refs.insert(name.to_string(), reference);
                state.append_logs(logs);
            }
            RefUpdate::Delete { name, expected } => {
                check_expected(&name, Some(&expected), state.refs.get(&name))?;
                state.refs.remove(&name);
                state.logs.remove(&name);
            }
            RefUpdate::Rename {
                from,
                expected,
                reference,
                displaced,
                follow,
                logs,
            } => {
                let to = reference.name();
                check_expected(&from, Some(&expected), state.refs.get(&from))?;
                check_expected(to, displaced.as_ref(), state.refs.get(to))?;
                if displaced.is_none() {
                    check_hierarchy(to, state.refs.keys().map(String::as_str))?;
                }
                if let Some(follow) = &follow {
                    let points_at_from = Target::Symbolic(from.clone());
                    check_expected(follow.name(), Some(&points_at_from), state.refs.get(follow.name()))?;
                }

                state.refs.remove(&from);
                // A forced rename replaces the destination, history included.
                state.logs.remove(to);
                if let Some(log) = state.logs.remove(&from) {
                    state.logs.insert(to.to_string(), log);
                }
                state.refs.insert(to.to_string(), reference);
                if let Some(follow) = follow {
                    state.refs.insert(follow.name().to_string(), follow);
                }
                state.append_logs(logs);
            }
        }
        Ok(())
    }

    fn read_log(&self, name: &str) -> Result<Vec<RefLogEntry>> {
        let state = self.state.read().map_err(RefError::poisoned)?;
        Ok(state.logs.get(name).cloned().unwrap_or_default())
    }

    fn has_log(&self, name: &str) -> Result<bool> {
        let state = self.state.read().map_err(RefError::poisoned)?;
        Ok(state.logs.contains_key(name))
    }

    fn create_log(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().map_err(RefError::poisoned)?;
        state.logs.entry(name.to_string()).or_default();
        Ok(())
    }
}
