//! Revision expression resolution for refdb.
//!
//! [`Resolver`] turns strings such as `HEAD~2`, `v1.0^{tree}`, `main@{3}`,
//! `@{-1}`, `topic@{upstream}` or `main...topic` into object ids, using a
//! [`RefStore`](refdb_refs::RefStore) for names and reflogs and an
//! [`ObjectGraph`](refdb_graph::ObjectGraph) for navigation and peeling.
//!
//! ```text
//! name    := <refname> | <full hex id> | <hex prefix> | <describe output>
//! suffix  := ^N | ~N | ^{type} | ^{} | @{N} | @{upstream}
//! range   := expr..expr | expr...expr
//! ```

pub mod error;
mod parse;
pub mod resolver;
pub mod spec;

pub use error::{Result, RevParseError};
pub use resolver::Resolver;
pub use spec::{ResolvedObject, RevFlags, RevisionSpec};
