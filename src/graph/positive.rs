//! Positive-triple membership index

use std::collections::{HashMap, HashSet};

use crate::types::{EntityId, RelationId, Triple};

/// Set of observed triples keyed by (head, relation) → valid tails
///
/// Used to reject accidental true facts during negative sampling and to
/// filter known positives out of ranking metrics.
#[derive(Debug, Default, Clone)]
pub struct PositiveTriples {
    tails: HashMap<(EntityId, RelationId), HashSet<EntityId>>,
    len: usize,
}

impl PositiveTriples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple, returning `false` if it was already present
    pub fn insert(&mut self, triple: Triple) -> bool {
        let added = self
            .tails
            .entry((triple.head, triple.relation))
            .or_default()
            .insert(triple.tail);
        if added {
            self.len += 1;
        }
        added
    }

    pub fn contains(&self, head: EntityId, relation: RelationId, tail: EntityId) -> bool {
        self.tails
            .get(&(head, relation))
            .map(|tails| tails.contains(&tail))
            .unwrap_or(false)
    }

    pub fn contains_triple(&self, triple: &Triple) -> bool {
        self.contains(triple.head, triple.relation, triple.tail)
    }

    /// Valid tails for (head, relation)
    pub fn tails(&self, head: EntityId, relation: RelationId) -> Option<&HashSet<EntityId>> {
        self.tails.get(&(head, relation))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Extend<Triple> for PositiveTriples {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for triple in iter {
            self.insert(triple);
        }
    }
}

impl FromIterator<Triple> for PositiveTriples {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut positives = Self::new();
        positives.extend(iter);
        positives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut positives = PositiveTriples::new();
        assert!(positives.insert(Triple::new(0, 1, 2)));
        assert!(!positives.insert(Triple::new(0, 1, 2)));
        positives.insert(Triple::new(0, 1, 3));

        assert_eq!(positives.len(), 2);
        assert!(positives.contains(0, 1, 2));
        assert!(!positives.contains(0, 2, 2));
        assert!(!positives.contains(2, 1, 0));
        assert_eq!(positives.tails(0, 1).map(|t| t.len()), Some(2));
    }

    #[test]
    fn test_collect() {
        let positives: PositiveTriples =
            vec![Triple::new(1, 0, 2), Triple::new(2, 0, 1)].into_iter().collect();
        assert!(positives.contains_triple(&Triple::new(2, 0, 1)));
        assert!(!positives.is_empty());
    }
}
