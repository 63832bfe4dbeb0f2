//! Margin-loss embedding trainer
//!
//! Each mini-batch draws `batch_size` random positive examples and processes
//! them on a dedicated worker pool. Workers score against the committed
//! tables and write into per-row locked [`WriteBuffer`]s; once every worker
//! has finished the batch, touched rows are renormalized and committed in a
//! single step. Every sample gets its own generator seeded from
//! `(seed, epoch, batch, sample)`, so the sequence of draws does not depend on
//! thread scheduling.

mod config;
mod sampler;
mod step;

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedding::{cap_norm, EmbeddingTable, Embeddings, WriteBuffer};
use crate::error::{Error, Result};
use crate::graph::PositiveTriples;
use crate::pcra::ConfidenceTable;
use crate::types::{PathRecord, RelationId, Triple};

pub use config::TrainingConfig;
pub use sampler::{Corruption, CorruptionMix, NegativeSampler};

use step::Step;

/// A path whose composition should agree with the example's relation
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPath {
    pub relations: Vec<RelationId>,
    /// `share * max(min_path_confidence, confidence)`
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub triple: Triple,
    pub paths: Vec<WeightedPath>,
}

/// Positive examples with precomputed path weights
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    examples: Vec<TrainingExample>,
    positives: PositiveTriples,
    entity_count: usize,
    relation_count: usize,
}

impl TrainingSet {
    /// Examples without path evidence
    pub fn from_triples(triples: &[Triple], entity_count: usize, relation_count: usize) -> Self {
        let records: Vec<PathRecord> = triples
            .iter()
            .map(|&triple| PathRecord::new(triple, Vec::new()))
            .collect();
        Self::from_records(&records, &ConfidenceTable::new(), entity_count, relation_count, 0.0)
    }

    /// Examples from path records, weighting each path by its share and its
    /// confidence for the record's relation
    ///
    /// Records that reference ids outside the tables are logged and skipped.
    pub fn from_records(
        records: &[PathRecord],
        confidences: &ConfidenceTable,
        entity_count: usize,
        relation_count: usize,
        min_path_confidence: f32,
    ) -> Self {
        let mut examples = Vec::with_capacity(records.len());
        let mut positives = PositiveTriples::new();
        let mut skipped = 0usize;

        for record in records {
            let triple = record.triple;
            let in_range = triple.head < entity_count
                && triple.tail < entity_count
                && triple.relation < relation_count
                && record
                    .paths
                    .iter()
                    .all(|share| share.path.iter().all(|r| r < relation_count));
            if !in_range {
                warn!(%triple, "skipping path record with unknown ids");
                skipped += 1;
                continue;
            }

            let paths = record
                .paths
                .iter()
                .map(|share| {
                    let confidence = confidences
                        .get(&share.path, triple.relation)
                        .unwrap_or(0.0)
                        .max(min_path_confidence);
                    WeightedPath {
                        relations: share.path.relations().to_vec(),
                        weight: share.share * confidence,
                    }
                })
                .collect();

            positives.insert(triple);
            examples.push(TrainingExample { triple, paths });
        }

        if skipped > 0 {
            warn!(skipped, kept = examples.len(), "dropped path records");
        }

        Self {
            examples,
            positives,
            entity_count,
            relation_count,
        }
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn positives(&self) -> &PositiveTriples {
        &self.positives
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// Relation ids including inverses
    pub fn relation_count(&self) -> usize {
        self.relation_count
    }
}

/// Lifecycle of a [`Trainer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TrainerState {
    Uninitialized,
    VectorsInitialized,
    Training { epoch: usize },
    Exhausted { epochs: usize },
}

/// Outcome of [`Trainer::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub batch_size: usize,
    pub steps: u64,
    /// Summed hinge violations per epoch
    pub epoch_errors: Vec<f64>,
    pub elapsed_ms: u64,
    pub state: TrainerState,
}

impl TrainingReport {
    pub fn final_error(&self) -> Option<f64> {
        self.epoch_errors.last().copied()
    }
}

pub struct Trainer {
    config: TrainingConfig,
    data: TrainingSet,
    state: TrainerState,
    embeddings: Option<Embeddings>,
    pool: ThreadPool,
}

impl Trainer {
    pub fn new(config: TrainingConfig, data: TrainingSet) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("trainer-{}", i))
            .build()
            .map_err(|e| Error::Config(format!("worker pool: {}", e)))?;

        Ok(Self {
            config,
            data,
            state: TrainerState::Uninitialized,
            embeddings: None,
            pool,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn embeddings(&self) -> Option<&Embeddings> {
        self.embeddings.as_ref()
    }

    pub fn into_embeddings(self) -> Option<Embeddings> {
        self.embeddings
    }

    /// Random bounded vectors for every entity and relation
    pub fn initialize(&mut self) -> Result<()> {
        let mut rng = XorShiftRng::seed_from_u64(self.config.seed);
        let entities =
            EmbeddingTable::random(self.data.entity_count, self.config.dim, &mut rng)?;
        let relations =
            EmbeddingTable::random(self.data.relation_count, self.config.dim, &mut rng)?;
        self.embeddings = Some(Embeddings::new(entities, relations)?);
        self.state = TrainerState::VectorsInitialized;
        info!(
            entities = self.data.entity_count,
            relations = self.data.relation_count,
            dim = self.config.dim,
            "Initialized vectors"
        );
        Ok(())
    }

    /// Start from existing vectors, capping every row's norm at 1
    pub fn initialize_with(&mut self, mut embeddings: Embeddings) -> Result<()> {
        if embeddings.dim() != self.config.dim
            || embeddings.entities.len() != self.data.entity_count
            || embeddings.relations.len() != self.data.relation_count
        {
            return Err(Error::Config(format!(
                "embeddings of shape {}x{} / {}x{} do not match {} entities, {} relations, dim {}",
                embeddings.entities.len(),
                embeddings.entities.dim(),
                embeddings.relations.len(),
                embeddings.relations.dim(),
                self.data.entity_count,
                self.data.relation_count,
                self.config.dim
            )));
        }
        for table in [&mut embeddings.entities, &mut embeddings.relations] {
            let dim = table.dim();
            for row in table.as_flat_mut().chunks_mut(dim) {
                cap_norm(row);
            }
        }
        self.embeddings = Some(embeddings);
        self.state = TrainerState::VectorsInitialized;
        Ok(())
    }

    /// Run the full epoch budget
    ///
    /// Initializes random vectors first if none are present. Aborts on a
    /// numerical fault or when negative sampling is exhausted.
    pub fn train(&mut self) -> Result<TrainingReport> {
        match self.state {
            TrainerState::Uninitialized => self.initialize()?,
            TrainerState::VectorsInitialized => {}
            state => {
                return Err(Error::Config(format!(
                    "trainer cannot start from state {:?}",
                    state
                )))
            }
        }
        if self.data.is_empty() {
            return Err(Error::Config("no training examples".to_string()));
        }

        let mut embeddings = self
            .embeddings
            .take()
            .ok_or_else(|| Error::Config("vectors are not initialized".to_string()))?;

        let started = Instant::now();
        let batch_size = (self.data.len() / self.config.batches_per_epoch).max(1);
        let mut epoch_errors = Vec::with_capacity(self.config.epochs);

        info!(
            examples = self.data.len(),
            epochs = self.config.epochs,
            batch_size,
            margin = self.config.margin,
            distance = ?self.config.distance,
            "Training"
        );

        let result = self.run_epochs(&mut embeddings, batch_size, &mut epoch_errors);
        self.embeddings = Some(embeddings);

        if let Err(e) = result {
            self.state = TrainerState::Training {
                epoch: epoch_errors.len(),
            };
            return Err(e);
        }

        self.state = TrainerState::Exhausted {
            epochs: self.config.epochs,
        };
        let report = TrainingReport {
            epochs: self.config.epochs,
            batch_size,
            steps: (self.config.epochs * self.config.batches_per_epoch * batch_size) as u64,
            epoch_errors,
            elapsed_ms: started.elapsed().as_millis() as u64,
            state: self.state,
        };
        info!(
            epochs = report.epochs,
            final_error = report.final_error().unwrap_or(0.0),
            elapsed_ms = report.elapsed_ms,
            "Training complete"
        );
        Ok(report)
    }

    fn run_epochs(
        &self,
        embeddings: &mut Embeddings,
        batch_size: usize,
        epoch_errors: &mut Vec<f64>,
    ) -> Result<()> {
        let entity_writes = WriteBuffer::new("entity", &embeddings.entities);
        let relation_writes = WriteBuffer::new("relation", &embeddings.relations);
        let sampler = NegativeSampler::new(
            self.data.positives(),
            self.data.entity_count,
            self.data.relation_count,
            self.config.max_corruption_attempts,
        );
        let started = Instant::now();

        for epoch in 0..self.config.epochs {
            let learning_rate = self.config.learning_rate_at(epoch);
            if epoch == 0 || self.config.halving_interval().map_or(false, |i| epoch % i == 0) {
                info!(epoch, learning_rate, "Learning rate");
            }

            let mut epoch_error = 0.0f64;
            for batch in 0..self.config.batches_per_epoch {
                let step = Step {
                    entities: &embeddings.entities,
                    relations: &embeddings.relations,
                    entity_writes: &entity_writes,
                    relation_writes: &relation_writes,
                    distance: self.config.distance,
                    learning_rate,
                    margin: self.config.margin,
                    path_margin: self.config.path_margin(),
                };

                let batch_error = self.pool.install(|| {
                    (0..batch_size)
                        .into_par_iter()
                        .map(|k| self.sample(&step, &sampler, epoch, batch, k))
                        .try_reduce(|| 0.0, |a, b| Ok(a + b))
                })?;
                epoch_error += batch_error;

                let entities = entity_writes.commit(&mut embeddings.entities, epoch, batch)?;
                let relations = relation_writes.commit(&mut embeddings.relations, epoch, batch)?;
                debug!(epoch, batch, batch_error, entities, relations, "Committed batch");
            }

            epoch_errors.push(epoch_error);
            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                info!(
                    epoch,
                    epochs = self.config.epochs,
                    epoch_error,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Epoch"
                );
            }
        }
        Ok(())
    }

    /// One positive example, its corruption and its path losses
    fn sample(
        &self,
        step: &Step<'_>,
        sampler: &NegativeSampler<'_>,
        epoch: usize,
        batch: usize,
        k: usize,
    ) -> Result<f64> {
        let mut rng = XorShiftRng::seed_from_u64(sample_seed(self.config.seed, epoch, batch, k));
        let examples = self.data.examples();
        let example = &examples[rng.random_range(0..examples.len())];
        let triple = example.triple;

        let kind = self.config.corruption.choose(&mut rng);
        let negative = sampler.corrupt(triple, kind, &mut rng)?;
        let mut loss = step.triple_loss(triple, negative) as f64;

        if !example.paths.is_empty() {
            let corrupted = sampler.corrupt_relation(triple, &mut rng)?;
            for path in &example.paths {
                loss += step.path_loss(triple.relation, corrupted, &path.relations, path.weight)
                    as f64;
            }
        }
        Ok(loss)
    }
}

/// Seed of the generator for one sample
fn sample_seed(seed: u64, epoch: usize, batch: usize, sample: usize) -> u64 {
    [epoch as u64, batch as u64, sample as u64]
        .iter()
        .fold(splitmix64(seed), |acc, &part| splitmix64(acc ^ part))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
