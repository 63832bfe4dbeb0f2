//! Ordered head → relation → tails adjacency with inverse edges

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::inverse_relation;
use crate::types::{EntityId, EntityPair, RelationId, Triple};

/// Outgoing edges of one head, by relation
pub type Outgoing = BTreeMap<RelationId, BTreeSet<EntityId>>;

/// Adjacency over training triples, each inserted forwards and, under the
/// inverse relation, backwards
#[derive(Debug, Default, Clone)]
pub struct Adjacency {
    out: BTreeMap<EntityId, Outgoing>,
    direct: HashMap<EntityPair, BTreeSet<RelationId>>,
    edges: usize,
}

impl Adjacency {
    pub fn build(triples: &[Triple], base_relation_count: usize) -> Self {
        let mut adjacency = Self::default();
        for triple in triples {
            adjacency.insert(triple.head, triple.relation, triple.tail);
            adjacency.insert(
                triple.tail,
                inverse_relation(triple.relation, base_relation_count),
                triple.head,
            );
        }
        adjacency
    }

    fn insert(&mut self, head: EntityId, relation: RelationId, tail: EntityId) {
        let added = self
            .out
            .entry(head)
            .or_default()
            .entry(relation)
            .or_default()
            .insert(tail);
        if added {
            self.edges += 1;
        }
        self.direct
            .entry(EntityPair::new(head, tail))
            .or_default()
            .insert(relation);
    }

    /// Heads with at least one outgoing edge, ascending
    pub fn heads(&self) -> Vec<EntityId> {
        self.out.keys().copied().collect()
    }

    pub fn outgoing(&self, head: EntityId) -> Option<&Outgoing> {
        self.out.get(&head)
    }

    /// Relations directly linking `pair`
    pub fn direct(&self, pair: &EntityPair) -> Option<&BTreeSet<RelationId>> {
        self.direct.get(pair)
    }

    /// Distinct edges, inverses included
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    pub fn head_count(&self) -> usize {
        self.out.len()
    }
}
