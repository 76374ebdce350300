//! Foundation types for refdb.
//!
//! Every other refdb crate depends on `refdb-types`. It carries the identity
//! layer (content hashes and their hex forms) and the small vocabulary shared
//! by the reference store, the object graph, and the revision resolver.
//!
//! # Key Types
//!
//! - [`ObjectId`] — fixed-width content hash (20-byte SHA-1 or 32-byte BLAKE3)
//! - [`HexPrefix`] — validated abbreviated object id
//! - [`ObjectKind`] — commit, tree, blob, or tag
//! - [`Signature`] — committer identity and timestamp for reflog entries
//! - [`ErrorCode`] — the structured error classification every crate maps to

pub mod code;
pub mod error;
pub mod kind;
pub mod object;
pub mod signature;

pub use code::ErrorCode;
pub use error::TypeError;
pub use kind::ObjectKind;
pub use object::{HashKind, HexPrefix, ObjectId};
pub use signature::{Signature, Time};
