//! Path-Constraint Resource Allocation
//!
//! Estimates how reliably 1- and 2-hop relation paths imply a direct relation.
//! Each head spreads a unit budget over its outgoing edges (pass 1), the
//! resource reaching each 1-hop tail is spread again over that tail's edges
//! (pass 2), and the resource accumulated per (head, tail) pair is normalized
//! into path shares. Confidence of a path for a relation is the fraction of
//! the path's instances whose endpoints are also linked by that relation.
//!
//! Both passes run in parallel over heads. Pass 2 reads the resources pass 1
//! produced, so it starts only once pass 1 is complete. Adjacency and merge
//! order are fixed, so repeated runs on the same triples are identical.

mod adjacency;
mod allocate;
mod tables;

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::graph::inverse_relation;
use crate::types::{EntityPair, PathRecord, PathShare, RelationPath, Triple};

pub use adjacency::Adjacency;
pub use tables::{ConfidenceKey, ConfidenceTable, PathResourceTable};

/// Allocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcraConfig {
    /// Normalized shares at or below this value are discarded
    pub min_resource: f32,
    /// Log progress every this many heads (0 disables)
    pub log_every: usize,
}

impl Default for PcraConfig {
    fn default() -> Self {
        Self {
            min_resource: 0.01,
            log_every: 1_000,
        }
    }
}

impl PcraConfig {
    pub fn with_min_resource(mut self, min_resource: f32) -> Self {
        self.min_resource = min_resource;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.min_resource) {
            return Err(Error::Config(format!(
                "min_resource must be in [0, 1), got {}",
                self.min_resource
            )));
        }
        Ok(())
    }
}

/// Counters describing one allocation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcraStats {
    pub heads: usize,
    /// Edges including inverses
    pub edges: usize,
    pub distinct_paths: usize,
    pub pairs: usize,
    pub retained_paths: usize,
    pub confidences: usize,
    pub skipped_triples: usize,
    pub elapsed_ms: u64,
}

/// Pair-level resources, path confidences and run statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PcraOutput {
    pub resources: PathResourceTable,
    pub confidences: ConfidenceTable,
    pub stats: PcraStats,
    base_relation_count: usize,
}

impl PcraOutput {
    /// One record per triple and one for its inverse, each joined with the
    /// retained paths of its pair
    pub fn records(&self, triples: &[Triple]) -> Vec<PathRecord> {
        triples
            .iter()
            .flat_map(|&triple| {
                let inverse = Triple::new(
                    triple.tail,
                    inverse_relation(triple.relation, self.base_relation_count),
                    triple.head,
                );
                [self.resources.record(triple), self.resources.record(inverse)]
            })
            .collect()
    }
}

/// Path resource allocator
#[derive(Debug, Clone, Default)]
pub struct Pcra {
    config: PcraConfig,
}

impl Pcra {
    pub fn new(config: PcraConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run both passes over base-relation training triples
    ///
    /// Triples whose relation is not a base relation are logged and skipped.
    pub fn run(&self, triples: &[Triple], base_relation_count: usize) -> PcraOutput {
        let started = Instant::now();

        let (kept, skipped): (Vec<Triple>, Vec<Triple>) = triples
            .iter()
            .partition(|triple| triple.relation < base_relation_count);
        for triple in &skipped {
            warn!(%triple, base_relation_count, "skipping triple with non-base relation");
        }

        let adjacency = Adjacency::build(&kept, base_relation_count);
        info!(
            heads = adjacency.head_count(),
            edges = adjacency.edge_count(),
            "Executing path-constraint resource allocation"
        );

        let (mut counts, mut raw) = allocate::one_hop(&adjacency, self.config.log_every);
        info!(
            paths = counts.occurrences.len(),
            related = counts.related.len(),
            "1-hop pass complete"
        );

        let (two_hop_counts, two_hop_raw) =
            allocate::two_hop(&adjacency, &raw, self.config.log_every);
        allocate::combine(&mut counts, &mut raw, two_hop_counts, two_hop_raw);
        info!(
            paths = counts.occurrences.len(),
            related = counts.related.len(),
            "2-hop pass complete"
        );

        let resources = self.normalize(&raw);

        let retained: BTreeSet<&RelationPath> = resources
            .iter()
            .flat_map(|(_, paths)| paths.iter().map(|share| &share.path))
            .collect();

        let mut confidences = ConfidenceTable::new();
        for (key, &related) in &counts.related {
            if !retained.contains(&key.path) {
                continue;
            }
            if let Some(&occurrences) = counts.occurrences.get(&key.path) {
                confidences.insert(
                    key.path.clone(),
                    key.relation,
                    related as f32 / occurrences as f32,
                );
            }
        }

        let stats = PcraStats {
            heads: adjacency.head_count(),
            edges: adjacency.edge_count(),
            distinct_paths: counts.occurrences.len(),
            pairs: resources.len(),
            retained_paths: resources.path_count(),
            confidences: confidences.len(),
            skipped_triples: skipped.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            pairs = stats.pairs,
            retained_paths = stats.retained_paths,
            confidences = stats.confidences,
            elapsed_ms = stats.elapsed_ms,
            "Executed path-constraint resource allocation"
        );

        PcraOutput {
            resources,
            confidences,
            stats,
            base_relation_count,
        }
    }

    /// Normalize each pair's paths by their total and drop small shares
    fn normalize(&self, raw: &allocate::RawResources) -> PathResourceTable {
        let mut table = PathResourceTable::new();
        let mut current: Option<EntityPair> = None;
        let mut group: Vec<(RelationPath, f32)> = Vec::new();

        let mut flush = |pair: EntityPair, group: &mut Vec<(RelationPath, f32)>| {
            let sum: f32 = group.iter().map(|(_, value)| value).sum();
            let shares = group
                .drain(..)
                .filter_map(|(path, value)| {
                    let share = if sum > 0.0 { value / sum } else { 0.0 };
                    (share > self.config.min_resource).then(|| PathShare::new(path, share))
                })
                .collect();
            table.insert(pair, shares);
        };

        for ((pair, path), &value) in raw {
            if current != Some(*pair) {
                if let Some(previous) = current {
                    flush(previous, &mut group);
                }
                current = Some(*pair);
            }
            group.push((path.clone(), value));
        }
        if let Some(previous) = current {
            flush(previous, &mut group);
        }

        table
    }
}
