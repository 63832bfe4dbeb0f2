//! Building `entity2id`, `relation2id` and the train/valid/test files from a
//! raw triple source

use std::collections::{HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{GraphIndex, TripleSource};
use crate::config::{DataLayout, Split};
use crate::error::{Error, Result};
use crate::io::{write_id_table, write_raw_triples};
use crate::types::RawTriple;

/// Hold-out and filtering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub valid_ratio: f64,
    pub test_ratio: f64,
    /// Heads with fewer distinct outgoing triples are dropped entirely
    pub min_relations_per_head: usize,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            valid_ratio: 0.0,
            test_ratio: 0.0,
            min_relations_per_head: 1,
            seed: 42,
        }
    }
}

impl SplitConfig {
    pub fn with_ratios(mut self, valid_ratio: f64, test_ratio: f64) -> Self {
        self.valid_ratio = valid_ratio;
        self.test_ratio = test_ratio;
        self
    }

    pub fn with_min_relations_per_head(mut self, min: usize) -> Self {
        self.min_relations_per_head = min;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let valid = (0.0..=1.0).contains(&self.valid_ratio)
            && (0.0..=1.0).contains(&self.test_ratio)
            && self.valid_ratio + self.test_ratio <= 1.0;
        if !valid {
            return Err(Error::Config(format!(
                "split ratios must be in [0, 1] and sum to at most 1 (valid {}, test {})",
                self.valid_ratio, self.test_ratio
            )));
        }
        Ok(())
    }
}

/// Index plus the triples routed to each split
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub index: GraphIndex,
    pub train: Vec<RawTriple>,
    pub valid: Vec<RawTriple>,
    pub test: Vec<RawTriple>,
}

impl DatasetSplit {
    pub fn triples(&self, split: Split) -> &[RawTriple] {
        match split {
            Split::Train => &self.train,
            Split::Valid => &self.valid,
            Split::Test => &self.test,
        }
    }

    /// Persist both id tables and all three split files
    pub fn write(&self, layout: &DataLayout) -> Result<()> {
        write_id_table(&layout.entity2id(), self.index.entities())?;
        write_id_table(&layout.relation2id(), self.index.relations())?;
        for split in Split::ALL {
            write_raw_triples(&layout.triples(split), self.triples(split))?;
        }
        info!(
            dir = %layout.root().display(),
            entities = self.index.entity_count(),
            relations = self.index.base_relation_count(),
            train = self.train.len(),
            valid = self.valid.len(),
            test = self.test.len(),
            "Wrote dataset split"
        );
        Ok(())
    }
}

/// Deduplicate, filter sparse heads, assign ids and route triples to splits
///
/// Ids are assigned in first-seen order. Each triple draws once from a
/// generator seeded by `config.seed`, so the same source and seed always
/// give the same split.
pub fn split_dataset(source: &dyn TripleSource, config: &SplitConfig) -> Result<DatasetSplit> {
    config.validate()?;

    let mut seen = HashSet::new();
    let mut triples = Vec::new();
    source.for_each_triple(&mut |triple| {
        if seen.insert(triple.clone()) {
            triples.push(triple);
        }
    })?;

    let mut per_head: HashMap<&str, usize> = HashMap::new();
    for triple in &triples {
        *per_head.entry(triple.head.as_str()).or_insert(0) += 1;
    }

    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    let mut dataset = DatasetSplit::default();
    let mut dropped = 0usize;

    for triple in &triples {
        if per_head[triple.head.as_str()] < config.min_relations_per_head {
            dropped += 1;
            continue;
        }

        dataset.index.intern_triple(triple);
        let draw: f64 = rng.random();
        let target = if draw < config.test_ratio {
            &mut dataset.test
        } else if draw < config.test_ratio + config.valid_ratio {
            &mut dataset.valid
        } else {
            &mut dataset.train
        };
        target.push(triple.clone());
    }

    info!(
        source = source.name(),
        triples = triples.len(),
        dropped,
        entities = dataset.index.entity_count(),
        relations = dataset.index.base_relation_count(),
        "Split dataset"
    );
    Ok(dataset)
}
