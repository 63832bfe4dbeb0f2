//! Stage orchestration over one data directory
//!
//! Each stage reads the artifacts of the previous one from disk, so stages
//! can be rerun independently:
//!
//! 1. [`Pipeline::prepare`]: raw triples to id tables and split files
//! 2. [`Pipeline::allocate_paths`]: `path2`, `confidence`, `<split>_pra`
//! 3. [`Pipeline::train`]: `entity2vec`, `relation2vec`
//! 4. [`Pipeline::evaluate`]: `metrics.json`

use std::fs;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DataLayout, PipelineConfig, Split};
use crate::embedding::Embeddings;
use crate::error::Result;
use crate::eval::{EvalReport, Evaluator, PathEvidence};
use crate::graph::{split_dataset, DatasetSplit, GraphIndex, PositiveTriples, TripleSource};
use crate::io::{
    read_confidences, read_id_table, read_path_records, read_path_resources, read_raw_triples,
    write_confidences, write_path_records, write_path_resources,
};
use crate::pcra::{Pcra, PcraOutput, PcraStats};
use crate::trainer::{Trainer, TrainingReport, TrainingSet};
use crate::types::Triple;
use crate::utils::cleanup_temp_files;

/// Outcome of [`Pipeline::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pcra: PcraStats,
    pub training: TrainingReport,
    /// `None` when there is no test split
    pub eval: Option<EvalReport>,
}

/// Resolved triples of one split plus how many rows failed to resolve
struct LoadedSplit {
    triples: Vec<Triple>,
    unresolved: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    layout: DataLayout,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let layout = config.layout();
        Ok(Self { config, layout })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Split `source` and write the id tables and split files
    pub fn prepare(&self, source: &dyn TripleSource) -> Result<DatasetSplit> {
        fs::create_dir_all(self.layout.root())?;
        info!(source = source.name(), "Preparing dataset");
        let split = split_dataset(source, &self.config.split)?;
        split.write(&self.layout)?;
        Ok(split)
    }

    /// Index rebuilt from `entity2id` and `relation2id`
    pub fn load_index(&self) -> Result<GraphIndex> {
        let entities = read_id_table(&self.layout.entity2id())?;
        let relations = read_id_table(&self.layout.relation2id())?;
        let index = GraphIndex::from_tables(entities, relations)?;
        info!(
            entities = index.entity_count(),
            relations = index.base_relation_count(),
            "Loaded graph index"
        );
        Ok(index)
    }

    /// Run PCRA over the training triples and write its artifacts
    pub fn allocate_paths(&self) -> Result<PcraOutput> {
        let index = self.load_index()?;
        let train = self.require_split(&index, Split::Train)?;

        let pcra = Pcra::new(self.config.pcra.clone())?;
        let output = pcra.run(&train.triples, index.base_relation_count());

        write_path_resources(&self.layout.path2(), &output.resources)?;
        write_confidences(&self.layout.confidence(), &output.confidences)?;
        for split in Split::ALL {
            let Some(loaded) = self.optional_split(&index, split)? else {
                continue;
            };
            let records = output.records(&loaded.triples);
            write_path_records(&self.layout.path_records(split), &records)?;
            info!(%split, records = records.len(), "Wrote path records");
        }
        Ok(output)
    }

    /// Train on `train_pra` and write both vector files
    pub fn train(&self) -> Result<TrainingReport> {
        let index = self.load_index()?;
        let records = read_path_records(&self.layout.path_records(Split::Train))?;
        let confidences = read_confidences(&self.layout.confidence())?;

        let data = TrainingSet::from_records(
            &records,
            &confidences,
            index.entity_count(),
            index.relation_count(),
            self.config.training.min_path_confidence,
        );
        let mut trainer = Trainer::new(self.config.training.clone(), data)?;
        let report = trainer.train()?;

        if let Some(embeddings) = trainer.embeddings() {
            embeddings.save(&self.layout.entity2vec(), &self.layout.relation2vec())?;
            info!(
                entity_path = %self.layout.entity2vec().display(),
                relation_path = %self.layout.relation2vec().display(),
                "Wrote vectors"
            );
        }
        Ok(report)
    }

    /// Rank the test split and write `metrics.json`
    ///
    /// Returns `None` when there is no test split to evaluate.
    pub fn evaluate(&self) -> Result<Option<EvalReport>> {
        let index = self.load_index()?;
        let Some(test) = self.optional_split(&index, Split::Test)? else {
            return Ok(None);
        };

        let embeddings = Embeddings::load(
            &self.layout.entity2vec(),
            &self.layout.relation2vec(),
            index.entity_count(),
            index.relation_count(),
        )?;

        let mut evidence = PathEvidence::new(
            read_path_resources(&self.layout.path2())?,
            read_confidences(&self.layout.confidence())?,
        );
        let test_records = self.layout.path_records(Split::Test);
        if test_records.exists() {
            let records = read_path_records(&test_records)?;
            evidence = evidence.with_records(
                records
                    .iter()
                    .filter(|record| index.check(&record.triple).is_ok()),
            );
        }

        let mut known = PositiveTriples::new();
        for split in Split::ALL {
            if let Some(loaded) = self.optional_split(&index, split)? {
                known.extend(loaded.triples);
            }
        }

        let evaluator = Evaluator::new(
            self.config.eval.clone(),
            self.config.training.distance,
            embeddings,
            evidence,
            known,
            index.base_relation_count(),
        )?;
        let mut report = evaluator.evaluate(&test.triples);
        report.skipped += test.unresolved;

        report.log();
        report.write(&self.layout.metrics())?;
        Ok(Some(report))
    }

    /// Allocate, train and evaluate in order
    pub fn run(&self) -> Result<RunSummary> {
        if self.layout.root().is_dir() {
            let removed = cleanup_temp_files(self.layout.root())?;
            if removed > 0 {
                info!(removed, "Removed stale temp files");
            }
        }

        let pcra = self.allocate_paths()?.stats;
        let training = self.train()?;
        let eval = self.evaluate()?;
        Ok(RunSummary {
            pcra,
            training,
            eval,
        })
    }

    fn require_split(&self, index: &GraphIndex, split: Split) -> Result<LoadedSplit> {
        let raws = read_raw_triples(&self.layout.triples(split))?;
        let total = raws.len();
        let triples = index.resolve_all(raws);
        Ok(LoadedSplit {
            unresolved: total - triples.len(),
            triples,
        })
    }

    /// Valid and test files are optional; train is always required
    fn optional_split(&self, index: &GraphIndex, split: Split) -> Result<Option<LoadedSplit>> {
        let path = self.layout.triples(split);
        if split != Split::Train && !path.exists() {
            info!(%split, path = %path.display(), "No split file, skipping");
            return Ok(None);
        }
        self.require_split(index, split).map(Some)
    }
}
