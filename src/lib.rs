//! Path-Constrained Knowledge Graph Embeddings
//!
//! Learns translation embeddings for entities and relations where every
//! relation is also pulled towards the multi-hop relation paths that imply
//! it, then scores held-out triples by rank.
//!
//! # Features
//!
//! - **Path resource allocation**: 1- and 2-hop path shares per entity pair
//!   with per-relation path confidences
//! - **Parallel training**: mini-batches on a worker pool, staged into a
//!   per-row locked write buffer and committed once per batch
//! - **Seeded negatives**: head, tail and relation corruption that never
//!   returns a known positive
//! - **Rank evaluation**: raw and filtered mean rank, MRR and hits@N with
//!   path-boosted re-ranking of the top candidates
//!
//! # Modules
//!
//! - `types`: ids, triples, relation paths
//! - `graph`: id index, positive set, triple sources, dataset split
//! - `pcra`: path resource allocation and confidences
//! - `embedding`: vector tables, distances, write buffer
//! - `trainer`: margin-loss trainer and negative sampler
//! - `eval`: rank evaluator and candidate listings
//! - `io`: artifact readers and writers
//! - `config`: run settings and artifact layout
//! - `pipeline`: stage orchestration over one data directory
//! - `utils`: atomic file writes
//!
//! # Example
//!
//! ```no_run
//! use path_embed::{Pipeline, PipelineConfig};
//!
//! fn main() -> path_embed::Result<()> {
//!     let pipeline = Pipeline::new(PipelineConfig::new("data/kb2e"))?;
//!     let summary = pipeline.run()?;
//!     println!("final error: {:?}", summary.training.final_error());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod graph;
pub mod io;
pub mod pcra;
pub mod pipeline;
pub mod trainer;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{DataLayout, PipelineConfig, Split};
pub use embedding::{Distance, EmbeddingTable, Embeddings};
pub use error::{Error, Result};
pub use eval::{EvalConfig, EvalReport, Evaluator, PathEvidence};
pub use graph::{GraphIndex, PositiveTriples, TripleSource};
pub use pcra::{Pcra, PcraConfig, PcraOutput};
pub use pipeline::{Pipeline, RunSummary};
pub use trainer::{Trainer, TrainingConfig, TrainingReport, TrainingSet};
pub use types::{
    EntityId, EntityPair, PathRecord, PathShare, RawTriple, RelationId, RelationPath, Triple,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
