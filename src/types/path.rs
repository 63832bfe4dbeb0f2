//! Relation path types

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{RelationId, Triple};

/// Ordered chain of relations connecting a head to a tail
///
/// PCRA only produces paths of length 1 and 2, but the type does not limit
/// the length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationPath(Vec<RelationId>);

impl RelationPath {
    /// Create a path from a relation sequence
    pub fn new(relations: Vec<RelationId>) -> Self {
        Self(relations)
    }

    /// One-hop path
    pub fn single(relation: RelationId) -> Self {
        Self(vec![relation])
    }

    /// Two-hop path `first > second`
    pub fn compose(first: RelationId, second: RelationId) -> Self {
        Self(vec![first, second])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn relations(&self) -> &[RelationId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = RelationId> + '_ {
        self.0.iter().copied()
    }
}

/// Renders as `r1>r2`, the on-disk path notation
impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, relation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(">")?;
            }
            write!(f, "{}", relation)?;
        }
        Ok(())
    }
}

/// A path together with its normalized resource share for one entity pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathShare {
    pub path: RelationPath,
    pub share: f32,
}

impl PathShare {
    pub fn new(path: RelationPath, share: f32) -> Self {
        Self { path, share }
    }
}

/// One observed triple joined with the retained paths of its entity pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathRecord {
    pub triple: Triple,
    pub paths: Vec<PathShare>,
}

impl PathRecord {
    pub fn new(triple: Triple, paths: Vec<PathShare>) -> Self {
        Self { triple, paths }
    }
}
