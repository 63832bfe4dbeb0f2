//! Dense id assignment for entities and relations

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{EntityId, RawTriple, RelationId, Triple};

/// Forward and reverse lookup tables for entity keys and relation names
///
/// Only base relations are stored. The inverse of base relation `r` is
/// `r + base_relation_count()`, so inverse ids are only stable once every
/// relation has been interned.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GraphIndex {
    /// entity key → id
    entity_ids: HashMap<String, EntityId>,

    /// id → entity key
    entity_keys: Vec<String>,

    /// relation name → id
    relation_ids: HashMap<String, RelationId>,

    /// id → relation name
    relation_names: Vec<String>,
}

impl GraphIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted `(key, id)` tables
    ///
    /// Ids must be dense and 0-based in both tables.
    pub fn from_tables(
        entities: Vec<(String, usize)>,
        relations: Vec<(String, usize)>,
    ) -> Result<Self> {
        let entity_keys = dense_keys(entities, "entity")?;
        let relation_names = dense_keys(relations, "relation")?;

        let entity_ids = entity_keys
            .iter()
            .enumerate()
            .map(|(id, key)| (key.clone(), id))
            .collect();
        let relation_ids = relation_names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();

        Ok(Self {
            entity_ids,
            entity_keys,
            relation_ids,
            relation_names,
        })
    }

    /// Return the id for `key`, assigning the next free id if it is new
    pub fn intern_entity(&mut self, key: &str) -> EntityId {
        if let Some(&id) = self.entity_ids.get(key) {
            return id;
        }
        let id = self.entity_keys.len();
        self.entity_keys.push(key.to_string());
        self.entity_ids.insert(key.to_string(), id);
        id
    }

    /// Return the id for base relation `name`, assigning one if it is new
    pub fn intern_relation(&mut self, name: &str) -> RelationId {
        if let Some(&id) = self.relation_ids.get(name) {
            return id;
        }
        let id = self.relation_names.len();
        self.relation_names.push(name.to_string());
        self.relation_ids.insert(name.to_string(), id);
        id
    }

    /// Intern every part of a raw triple
    pub fn intern_triple(&mut self, raw: &RawTriple) -> Triple {
        let head = self.intern_entity(&raw.head);
        let tail = self.intern_entity(&raw.tail);
        let relation = self.intern_relation(&raw.relation);
        Triple::new(head, relation, tail)
    }

    /// Resolve a raw triple against the existing tables
    pub fn resolve(&self, raw: &RawTriple) -> Result<Triple> {
        let head = self
            .entity_id(&raw.head)
            .ok_or_else(|| Error::MissingEntity(raw.head.clone()))?;
        let tail = self
            .entity_id(&raw.tail)
            .ok_or_else(|| Error::MissingEntity(raw.tail.clone()))?;
        let relation = self
            .relation_id(&raw.relation)
            .ok_or_else(|| Error::MissingRelation(raw.relation.clone()))?;
        Ok(Triple::new(head, relation, tail))
    }

    /// Resolve many raw triples, logging and dropping the unresolvable ones
    pub fn resolve_all<I>(&self, raws: I) -> Vec<Triple>
    where
        I: IntoIterator<Item = RawTriple>,
    {
        let mut resolved = Vec::new();
        let mut skipped = 0usize;

        for raw in raws {
            match self.resolve(&raw) {
                Ok(triple) => resolved.push(triple),
                Err(e) => {
                    warn!(error = %e, "skipping triple");
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!(skipped, resolved = resolved.len(), "dropped unresolvable triples");
        }
        resolved
    }

    /// Check that an already-resolved triple only uses known ids
    pub fn check(&self, triple: &Triple) -> Result<()> {
        if triple.head >= self.entity_count() {
            return Err(Error::MissingEntity(triple.head.to_string()));
        }
        if triple.tail >= self.entity_count() {
            return Err(Error::MissingEntity(triple.tail.to_string()));
        }
        if triple.relation >= self.relation_count() {
            return Err(Error::MissingRelation(triple.relation.to_string()));
        }
        Ok(())
    }

    pub fn entity_id(&self, key: &str) -> Option<EntityId> {
        self.entity_ids.get(key).copied()
    }

    pub fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.relation_ids.get(name).copied()
    }

    pub fn entity_key(&self, id: EntityId) -> Option<&str> {
        self.entity_keys.get(id).map(String::as_str)
    }

    /// Name of a base relation (inverse ids return `None`)
    pub fn relation_name(&self, id: RelationId) -> Option<&str> {
        self.relation_names.get(id).map(String::as_str)
    }

    /// Human-readable label for any relation id, inverses as `name^-1`
    pub fn relation_label(&self, id: RelationId) -> String {
        if let Some(name) = self.relation_name(id) {
            return name.to_string();
        }
        match self.relation_name(id.wrapping_sub(self.base_relation_count())) {
            Some(name) if id < self.relation_count() => format!("{}^-1", name),
            _ => format!("#{}", id),
        }
    }

    /// Paired inverse id of any relation
    pub fn inverse(&self, relation: RelationId) -> RelationId {
        inverse_relation(relation, self.base_relation_count())
    }

    pub fn is_inverse(&self, relation: RelationId) -> bool {
        relation >= self.base_relation_count()
    }

    pub fn entity_count(&self) -> usize {
        self.entity_keys.len()
    }

    /// Number of relations as listed in `relation2id`
    pub fn base_relation_count(&self) -> usize {
        self.relation_names.len()
    }

    /// Number of relation ids including inverses
    pub fn relation_count(&self) -> usize {
        self.relation_names.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.entity_keys.is_empty()
    }

    /// `(key, id)` pairs in id order
    pub fn entities(&self) -> impl Iterator<Item = (&str, EntityId)> + '_ {
        self.entity_keys
            .iter()
            .enumerate()
            .map(|(id, key)| (key.as_str(), id))
    }

    /// `(name, id)` pairs of base relations in id order
    pub fn relations(&self) -> impl Iterator<Item = (&str, RelationId)> + '_ {
        self.relation_names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.as_str(), id))
    }
}

/// Inverse of `relation` given the number of base relations
pub fn inverse_relation(relation: RelationId, base_count: usize) -> RelationId {
    if relation < base_count {
        relation + base_count
    } else {
        relation - base_count
    }
}

fn dense_keys(mut table: Vec<(String, usize)>, kind: &str) -> Result<Vec<String>> {
    table.sort_by_key(|(_, id)| *id);
    let mut keys = Vec::with_capacity(table.len());
    for (position, (key, id)) in table.into_iter().enumerate() {
        if id != position {
            return Err(Error::Config(format!(
                "{} ids are not dense: expected id {} for '{}', found {}",
                kind, position, key, id
            )));
        }
        keys.push(key);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> GraphIndex {
        let mut index = GraphIndex::new();
        index.intern_triple(&RawTriple::new("Paris", "France", "capital_of"));
        index.intern_triple(&RawTriple::new("Berlin", "Germany", "capital_of"));
        index.intern_triple(&RawTriple::new("France", "Europe", "located_in"));
        index
    }

    #[test]
    fn test_ids_are_dense_and_stable() {
        let mut index = sample_index();
        assert_eq!(index.entity_count(), 5);
        assert_eq!(index.base_relation_count(), 2);
        assert_eq!(index.relation_count(), 4);

        assert_eq!(index.entity_id("Paris"), Some(0));
        assert_eq!(index.entity_id("France"), Some(1));
        assert_eq!(index.intern_entity("France"), 1);
        assert_eq!(index.entity_key(3), Some("Germany"));
        assert_eq!(index.relation_id("located_in"), Some(1));
    }

    #[test]
    fn test_inverse_ids() {
        let index = sample_index();
        assert_eq!(index.inverse(0), 2);
        assert_eq!(index.inverse(1), 3);
        assert_eq!(index.inverse(3), 1);
        assert!(index.is_inverse(2));
        assert_eq!(index.relation_label(0), "capital_of");
        assert_eq!(index.relation_label(3), "located_in^-1");
        assert_eq!(index.relation_label(9), "#9");
    }

    #[test]
    fn test_resolve_missing() {
        let index = sample_index();
        let ok = index.resolve(&RawTriple::new("Paris", "Europe", "located_in"));
        assert_eq!(ok.unwrap(), Triple::new(0, 1, 4));

        let err = index
            .resolve(&RawTriple::new("Rome", "Italy", "capital_of"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingEntity(ref k) if k == "Rome"));

        let err = index
            .resolve(&RawTriple::new("Paris", "France", "twinned_with"))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRelation(_)));
    }

    #[test]
    fn test_resolve_all_skips() {
        let index = sample_index();
        let resolved = index.resolve_all(vec![
            RawTriple::new("Paris", "France", "capital_of"),
            RawTriple::new("Rome", "Italy", "capital_of"),
            RawTriple::new("Germany", "Europe", "located_in"),
        ]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_from_tables_requires_dense_ids() {
        let index = GraphIndex::from_tables(
            vec![("B".to_string(), 1), ("A".to_string(), 0)],
            vec![("r".to_string(), 0)],
        )
        .unwrap();
        assert_eq!(index.entity_key(0), Some("A"));
        assert_eq!(index.entity_id("B"), Some(1));

        let err = GraphIndex::from_tables(vec![("A".to_string(), 1)], vec![]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_check_ids() {
        let index = sample_index();
        assert!(index.check(&Triple::new(0, 3, 1)).is_ok());
        assert!(index.check(&Triple::new(0, 4, 1)).is_err());
        assert!(index.check(&Triple::new(5, 0, 1)).is_err());
    }
}
