//! Object graph access for refdb.
//!
//! The reference store never interprets objects. The revision resolver and the
//! branch manager do: they need to know an object's kind, a commit's parents,
//! what a tag points at, and where two histories meet. This crate defines that
//! contract ([`ObjectGraph`]) and the walks built on top of it.
//!
//! # Modules
//!
//! - [`object`] — [`GraphObject`] and its commit/tree/blob/tag payloads
//! - [`traits`] — the [`ObjectGraph`] provider trait
//! - [`walk`] — peeling, parent/ancestor navigation, merge base
//! - [`hasher`] — domain-separated content hashing for object ids
//! - [`memory`] — [`InMemoryGraph`] for tests and embedding

pub mod error;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod traits;
pub mod walk;

pub use error::{GraphError, GraphResult};
pub use hasher::ContentHasher;
pub use memory::InMemoryGraph;
pub use object::{Blob, Commit, GraphObject, Tag, Tree};
pub use traits::ObjectGraph;
pub use walk::{merge_base, nth_ancestor, nth_parent, peel, peel_to_commit};
