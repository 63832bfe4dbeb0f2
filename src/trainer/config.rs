//! Training hyperparameters

use serde::{Deserialize, Serialize};

use super::sampler::CorruptionMix;
use crate::embedding::Distance;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Embedding dimension
    pub dim: usize,
    pub epochs: usize,
    /// Mini-batches per epoch; batch size is `max(1, examples / batches_per_epoch)`
    pub batches_per_epoch: usize,
    pub learning_rate: f32,
    /// Number of times the learning rate is halved over the run (0 keeps it fixed)
    pub lr_halvings: usize,
    pub margin: f32,
    /// Path loss margin is `margin * path_margin_factor`
    pub path_margin_factor: f32,
    /// Floor applied to path confidences when weighting the path loss
    pub min_path_confidence: f32,
    pub distance: Distance,
    pub corruption: CorruptionMix,
    pub max_corruption_attempts: usize,
    /// Worker threads (0 = one per core)
    pub workers: usize,
    pub seed: u64,
    /// Log the epoch error every this many epochs (0 disables)
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dim: 25,
            epochs: 1_000,
            batches_per_epoch: 100,
            learning_rate: 0.01,
            lr_halvings: 5,
            margin: 1.0,
            path_margin_factor: 2.0,
            min_path_confidence: 0.01,
            distance: Distance::L1,
            corruption: CorruptionMix::default(),
            max_corruption_attempts: 1_000,
            workers: 0,
            seed: 42,
            log_every: 10,
        }
    }
}

impl TrainingConfig {
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batches_per_epoch(mut self, batches: usize) -> Self {
        self.batches_per_epoch = batches;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_corruption(mut self, corruption: CorruptionMix) -> Self {
        self.corruption = corruption;
        self
    }

    pub fn with_max_corruption_attempts(mut self, attempts: usize) -> Self {
        self.max_corruption_attempts = attempts;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Margin of the path loss
    pub fn path_margin(&self) -> f32 {
        self.margin * self.path_margin_factor
    }

    /// Epochs between learning-rate halvings, if any
    pub fn halving_interval(&self) -> Option<usize> {
        if self.lr_halvings == 0 {
            None
        } else {
            Some((self.epochs / self.lr_halvings).max(1))
        }
    }

    /// Learning rate in effect during `epoch`
    pub fn learning_rate_at(&self, epoch: usize) -> f32 {
        match self.halving_interval() {
            Some(interval) => {
                let halvings = (epoch / interval).min(31) as i32;
                self.learning_rate / 2f32.powi(halvings)
            }
            None => self.learning_rate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Config("dim must be positive".to_string()));
        }
        if self.batches_per_epoch == 0 {
            return Err(Error::Config("batches_per_epoch must be positive".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0)
            || !(self.path_margin_factor.is_finite() && self.path_margin_factor >= 0.0)
        {
            return Err(Error::Config("margins must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_path_confidence) {
            return Err(Error::Config(
                "min_path_confidence must be in [0, 1]".to_string(),
            ));
        }
        if self.max_corruption_attempts == 0 {
            return Err(Error::Config(
                "max_corruption_attempts must be positive".to_string(),
            ));
        }
        self.corruption.validate()
    }
}
