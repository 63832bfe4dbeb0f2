//! Data types for path-embed
//!
//! Entities and relations are addressed by dense integer ids assigned by the
//! [`GraphIndex`](crate::graph::GraphIndex). Every base relation `r` has an
//! inverse `r + base_relation_count`.

mod path;
mod triple;

pub use path::{PathRecord, PathShare, RelationPath};
pub use triple::{EntityPair, RawTriple, Triple};

/// Dense 0-based entity identifier
pub type EntityId = usize;

/// Dense 0-based relation identifier (inverses included)
pub type RelationId = usize;
