//! Pair-level path resources and path → relation confidences

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{EntityPair, PathRecord, PathShare, RelationId, RelationPath, Triple};

/// Retained, normalized path shares per (head, tail) pair
///
/// Paths of each pair are kept sorted so iteration order is stable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PathResourceTable {
    pairs: BTreeMap<EntityPair, Vec<PathShare>>,
}

impl PathResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retained paths of `pair`
    pub fn insert(&mut self, pair: EntityPair, mut paths: Vec<PathShare>) {
        paths.sort_by(|a, b| a.path.cmp(&b.path));
        self.pairs.insert(pair, paths);
    }

    pub fn get(&self, pair: &EntityPair) -> &[PathShare] {
        self.pairs.get(pair).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, pair: &EntityPair) -> bool {
        self.pairs.contains_key(pair)
    }

    /// Pairs in (head, tail) order
    pub fn iter(&self) -> impl Iterator<Item = (&EntityPair, &[PathShare])> + '_ {
        self.pairs.iter().map(|(pair, paths)| (pair, paths.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Total number of retained (pair, path) entries
    pub fn path_count(&self) -> usize {
        self.pairs.values().map(Vec::len).sum()
    }

    /// Keep only the paths for which `keep` holds; returns how many were dropped
    pub fn retain_paths<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&PathShare) -> bool,
    {
        let mut dropped = 0;
        for paths in self.pairs.values_mut() {
            let before = paths.len();
            paths.retain(&mut keep);
            dropped += before - paths.len();
        }
        dropped
    }

    /// Join a triple with the retained paths of its pair
    pub fn record(&self, triple: Triple) -> PathRecord {
        PathRecord::new(triple, self.get(&triple.pair()).to_vec())
    }
}

/// Composite key of the confidence table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfidenceKey {
    pub path: RelationPath,
    pub relation: RelationId,
}

impl ConfidenceKey {
    pub fn new(path: RelationPath, relation: RelationId) -> Self {
        Self { path, relation }
    }
}

/// Confidence that a path implies a relation
///
/// Ordered by path, then relation, which is also the grouping of the
/// `confidence` artifact.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfidenceTable {
    entries: BTreeMap<ConfidenceKey, f32>,
}

impl ConfidenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: RelationPath, relation: RelationId, confidence: f32) {
        self.entries
            .insert(ConfidenceKey::new(path, relation), confidence);
    }

    pub fn get(&self, path: &RelationPath, relation: RelationId) -> Option<f32> {
        self.entries
            .get(&ConfidenceKey::new(path.clone(), relation))
            .copied()
    }

    /// All relations implied by `path`, in relation order
    pub fn relations_for<'a>(
        &'a self,
        path: &'a RelationPath,
    ) -> impl Iterator<Item = (RelationId, f32)> + 'a {
        let start = ConfidenceKey::new(path.clone(), 0);
        self.entries
            .range(start..)
            .take_while(move |(key, _)| &key.path == path)
            .map(|(key, confidence)| (key.relation, *confidence))
    }

    /// Entries grouped by path, in path order
    pub fn groups(&self) -> Vec<(&RelationPath, Vec<(RelationId, f32)>)> {
        let mut groups: Vec<(&RelationPath, Vec<(RelationId, f32)>)> = Vec::new();
        for (key, confidence) in &self.entries {
            let same_path = groups
                .last()
                .map(|(path, _)| *path == &key.path)
                .unwrap_or(false);
            if same_path {
                if let Some((_, rows)) = groups.last_mut() {
                    rows.push((key.relation, *confidence));
                }
            } else {
                groups.push((&key.path, vec![(key.relation, *confidence)]));
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
