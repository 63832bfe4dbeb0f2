//! Triple types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EntityId, RelationId};

/// A (head, relation, tail) fact over resolved ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub head: EntityId,
    pub relation: RelationId,
    pub tail: EntityId,
}

impl Triple {
    /// Create a new triple
    pub fn new(head: EntityId, relation: RelationId, tail: EntityId) -> Self {
        Self {
            head,
            relation,
            tail,
        }
    }

    /// The (head, tail) endpoints of this triple
    pub fn pair(&self) -> EntityPair {
        EntityPair::new(self.head, self.tail)
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.head, self.relation, self.tail)
    }
}

/// A triple as it appears in the source graph, before id assignment
///
/// Field order follows the on-disk layout `<head>\t<tail>\t<relation>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTriple {
    pub head: String,
    pub tail: String,
    pub relation: String,
}

impl RawTriple {
    /// Create a new raw triple
    pub fn new(
        head: impl Into<String>,
        tail: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            tail: tail.into(),
            relation: relation.into(),
        }
    }
}

/// Ordered (head, tail) entity pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityPair {
    pub head: EntityId,
    pub tail: EntityId,
}

impl EntityPair {
    pub fn new(head: EntityId, tail: EntityId) -> Self {
        Self { head, tail }
    }

    /// The same pair walked in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            head: self.tail,
            tail: self.head,
        }
    }
}
