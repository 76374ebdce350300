//! Branch management for refdb.
//!
//! A branch is a reference under `refs/heads/` (local) or `refs/remotes/`
//! (remote-tracking). [`BranchManager`] creates, renames, deletes and lists
//! them on top of a [`RefStore`](refdb_refs::RefStore), and records upstream
//! tracking in a [`ConfigStore`] as `branch.<name>.remote` and
//! `branch.<name>.merge`.
//!
//! # Modules
//!
//! - [`branch`] — [`Branch`], [`BranchKind`], [`BranchFilter`]
//! - [`config`] — the [`ConfigStore`] trait, [`InMemoryConfig`], [`FileConfig`]
//! - [`manager`] — [`BranchManager`]
//! - [`error`] — [`BranchError`], [`ConfigError`]

pub mod branch;
pub mod config;
pub mod error;
pub mod manager;

pub use branch::{Branch, BranchFilter, BranchKind};
pub use config::{ConfigStore, FileConfig, InMemoryConfig};
pub use error::{BranchError, ConfigError, Result};
pub use manager::{BranchIter, BranchManager, LOCAL_REMOTE};
