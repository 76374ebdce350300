//! Reference store for refdb.
//!
//! References are the human-readable names (`HEAD`, `refs/heads/main`,
//! `refs/tags/v1`) that point at objects, either directly or through another
//! reference. This crate validates those names, resolves symbolic chains,
//! keeps a reflog per reference, and persists everything through a pluggable
//! backend.
//!
//! # Architecture
//!
//! - [`RefStore`] is the entry point. It normalizes names, takes per-name
//!   locks, checks the caller's snapshot (compare-and-swap), decides which
//!   logs an update touches, and hands the backend one [`RefUpdate`].
//! - [`RefBackend`] stores references and logs. [`InMemoryBackend`] keeps
//!   them in a map; [`FileBackend`] writes loose ref files through
//!   `<name>.lock` files and CRC-framed reflogs.
//! - [`dwim`] expands shorthands like `main` using a fixed precedence.
//!
//! # Modules
//!
//! - [`error`] — [`RefError`] and its [`ErrorCode`](refdb_types::ErrorCode) mapping
//! - [`types`] — [`Reference`], [`Target`], [`RefLogEntry`]
//! - [`names`] — name validation and normalization
//! - [`config`] — [`StoreConfig`] and the logging policy
//! - [`backend`] — the [`RefBackend`] trait
//! - [`memory`] / [`file`] — backends
//! - [`store`] — [`RefStore`]

pub mod backend;
pub mod config;
pub mod dwim;
pub mod error;
pub mod file;
pub mod iter;
mod lock;
pub mod memory;
pub mod names;
mod reflog;
pub mod store;
pub mod types;

pub use backend::{LogAppend, RefBackend, RefUpdate};
pub use config::{CommitterConfig, LogUpdates, StoreConfig};
pub use dwim::DWIM_RULES;
pub use error::{RefError, Result};
pub use file::{FileBackend, FileBackendConfig, SyncMode};
pub use iter::{NameGlob, RefIter};
pub use memory::InMemoryBackend;
pub use names::{is_valid_name, normalize_name, NameOptions};
pub use store::RefStore;
pub use types::{
    shorthand, RefLogEntry, Reference, Target, HEAD, HEADS_PREFIX, NOTES_PREFIX, REFS_PREFIX,
    REMOTES_PREFIX, TAGS_PREFIX,
};
