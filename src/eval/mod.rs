//! Link-prediction evaluation
//!
//! Every held-out triple is ranked three ways: its tail against all entities,
//! its head against all entities and its relation against all base relations.
//! Candidates are scored by the embeddings alone, then the best
//! [`EvalConfig::rerank_top_k`] are re-scored with path evidence: a penalty
//! that grows with how far the relation sits from the paths linking the pair,
//! weighted by path share and confidence. Ranks are reported raw and filtered
//! (other known positives removed from the candidates ahead of the target).

mod listing;
mod metrics;
mod scorer;

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::{Distance, Embeddings};
use crate::error::{Error, Result};
use crate::graph::{inverse_relation, PositiveTriples};
use crate::pcra::{ConfidenceTable, PathResourceTable};
use crate::types::{PathRecord, Triple};
use crate::utils::atomic_write;

pub use listing::Candidate;
pub use metrics::{DirectionMetrics, RankMetrics};

use scorer::Slot;

/// Ranking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// N in hits@N
    pub hits_at: usize,
    /// Candidates re-scored with path evidence, best base score first
    pub rerank_top_k: usize,
    /// Also rank relations between the held-out head and tail
    pub rank_relations: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            hits_at: 10,
            rerank_top_k: 500,
            rank_relations: true,
        }
    }
}

impl EvalConfig {
    pub fn with_hits_at(mut self, hits_at: usize) -> Self {
        self.hits_at = hits_at;
        self
    }

    pub fn with_rerank_top_k(mut self, rerank_top_k: usize) -> Self {
        self.rerank_top_k = rerank_top_k;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.hits_at == 0 {
            return Err(Error::Config("hits_at must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Paths linking entity pairs and how much each path implies each relation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathEvidence {
    pub resources: PathResourceTable,
    pub confidences: ConfidenceTable,
}

impl PathEvidence {
    pub fn new(resources: PathResourceTable, confidences: ConfidenceTable) -> Self {
        Self {
            resources,
            confidences,
        }
    }

    /// Add the pairs of `records` that the resource table does not cover yet
    pub fn with_records<'a, I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = &'a PathRecord>,
    {
        for record in records {
            let pair = record.triple.pair();
            if !self.resources.contains(&pair) {
                self.resources.insert(pair, record.paths.clone());
            }
        }
        self
    }

    /// Drop paths that use a relation id outside `0..relation_count`;
    /// returns how many were dropped
    pub fn retain_known_relations(&mut self, relation_count: usize) -> usize {
        self.resources.retain_paths(|share| {
            share
                .path
                .relations()
                .iter()
                .all(|&relation| relation < relation_count)
        })
    }
}

/// Metrics of one evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub tail: DirectionMetrics,
    pub head: DirectionMetrics,
    pub relation: Option<DirectionMetrics>,
    /// Triples that produced at least one rank
    pub evaluated: usize,
    /// Triples dropped for unknown ids
    pub skipped: usize,
    /// Candidate scores dropped as non-finite
    pub gaps: usize,
    pub elapsed_ms: u64,
}

impl EvalReport {
    /// Write the report as pretty JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, &json)
    }

    pub fn log(&self) {
        info!(
            evaluated = self.evaluated,
            skipped = self.skipped,
            gaps = self.gaps,
            elapsed_ms = self.elapsed_ms,
            "Evaluation finished"
        );
        info!("tail raw      {}", self.tail.raw.summary());
        info!("tail filtered {}", self.tail.filtered.summary());
        info!("head raw      {}", self.head.raw.summary());
        info!("head filtered {}", self.head.filtered.summary());
        if let Some(relation) = &self.relation {
            info!("rel  raw      {}", relation.raw.summary());
            info!("rel  filtered {}", relation.filtered.summary());
        }
    }
}

/// Ranks of one held-out triple as `(raw, filtered)`
#[derive(Debug, Default)]
struct TripleRanks {
    tail: Option<(usize, usize)>,
    head: Option<(usize, usize)>,
    relation: Option<(usize, usize)>,
    gaps: usize,
}

/// Scores held-out triples against trained embeddings
pub struct Evaluator {
    config: EvalConfig,
    distance: Distance,
    embeddings: Embeddings,
    evidence: PathEvidence,
    known: PositiveTriples,
    base_relation_count: usize,
}

impl Evaluator {
    /// `known` holds every observed triple (all splits) used for filtering
    pub fn new(
        config: EvalConfig,
        distance: Distance,
        embeddings: Embeddings,
        mut evidence: PathEvidence,
        known: PositiveTriples,
        base_relation_count: usize,
    ) -> Result<Self> {
        config.validate()?;
        if embeddings.relations.len() != 2 * base_relation_count {
            return Err(Error::Config(format!(
                "expected {} relation vectors (base and inverse), found {}",
                2 * base_relation_count,
                embeddings.relations.len()
            )));
        }
        let dropped = evidence.retain_known_relations(2 * base_relation_count);
        if dropped > 0 {
            warn!(dropped, "dropping path evidence with unknown relation ids");
        }
        Ok(Self {
            config,
            distance,
            embeddings,
            evidence,
            known,
            base_relation_count,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }

    pub fn entity_count(&self) -> usize {
        self.embeddings.entities.len()
    }

    /// Rank every triple in `triples` and aggregate the metrics
    pub fn evaluate(&self, triples: &[Triple]) -> EvalReport {
        let started = Instant::now();
        info!(
            triples = triples.len(),
            entities = self.entity_count(),
            relations = self.base_relation_count,
            "Executing rank evaluation"
        );

        let outcomes: Vec<Option<TripleRanks>> = triples
            .par_iter()
            .map(|&triple| self.rank_triple(triple))
            .collect();

        let mut report = EvalReport::default();
        let mut tails = Vec::new();
        let mut heads = Vec::new();
        let mut relations = Vec::new();
        for outcome in outcomes {
            let Some(ranks) = outcome else {
                report.skipped += 1;
                continue;
            };
            report.gaps += ranks.gaps;
            if ranks.tail.is_none() && ranks.head.is_none() && ranks.relation.is_none() {
                continue;
            }
            report.evaluated += 1;
            tails.extend(ranks.tail);
            heads.extend(ranks.head);
            relations.extend(ranks.relation);
        }

        let hits_at = self.config.hits_at;
        report.tail = DirectionMetrics::from_ranks(&tails, hits_at);
        report.head = DirectionMetrics::from_ranks(&heads, hits_at);
        if self.config.rank_relations {
            report.relation = Some(DirectionMetrics::from_ranks(&relations, hits_at));
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report
    }

    /// Inverse triples are ranked in their base form
    fn canonical(&self, triple: Triple) -> Option<Triple> {
        let entity_count = self.entity_count();
        let base = self.base_relation_count;
        if triple.head >= entity_count || triple.tail >= entity_count || triple.relation >= 2 * base
        {
            return None;
        }
        if triple.relation >= base {
            Some(Triple::new(
                triple.tail,
                inverse_relation(triple.relation, base),
                triple.head,
            ))
        } else {
            Some(triple)
        }
    }

    fn rank_triple(&self, triple: Triple) -> Option<TripleRanks> {
        let Some(Triple {
            head,
            relation,
            tail,
        }) = self.canonical(triple)
        else {
            warn!(%triple, "skipping triple with unknown ids");
            return None;
        };

        let mut ranks = TripleRanks::default();

        let scores = self.score_candidates(head, relation, tail, Slot::Tail);
        ranks.gaps += scores.gaps;
        ranks.tail = scores.rank(tail, |e| self.known.contains(head, relation, e));

        let scores = self.score_candidates(head, relation, tail, Slot::Head);
        ranks.gaps += scores.gaps;
        ranks.head = scores.rank(head, |e| self.known.contains(e, relation, tail));

        if self.config.rank_relations {
            let scores = self.score_candidates(head, relation, tail, Slot::Relation);
            ranks.gaps += scores.gaps;
            ranks.relation = scores.rank(relation, |r| self.known.contains(head, r, tail));
        }

        Some(ranks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingTable;
    use crate::types::{EntityPair, PathShare, RelationPath};

    fn evaluator(evidence: PathEvidence) -> Evaluator {
        evaluator_with(EvalConfig::default(), evidence)
    }

    /// A=0, B=1, C=2, D=3 with R=0 placing B exactly at A + R
    fn evaluator_with(config: EvalConfig, evidence: PathEvidence) -> Evaluator {
        let entities = EmbeddingTable::from_rows(vec![
            vec![0.0, 0.0],
            vec![0.5, 0.0],
            vec![-0.5, 0.0],
            vec![0.0, 0.5],
        ])
        .unwrap();
        let relations =
            EmbeddingTable::from_rows(vec![vec![0.5, 0.0], vec![-0.5, 0.0]]).unwrap();
        let embeddings = Embeddings::new(entities, relations).unwrap();
        let known: PositiveTriples = vec![Triple::new(0, 0, 1)].into_iter().collect();
        Evaluator::new(config, Distance::L1, embeddings, evidence, known, 1).unwrap()
    }

    #[test]
    fn test_base_score_prefers_true_tail() {
        let evaluator = evaluator(PathEvidence::default());
        assert_eq!(evaluator.base_score(0, 0, 1), 0.0);
        assert!(evaluator.base_score(0, 0, 2) < evaluator.base_score(0, 0, 1));
        assert!(evaluator.base_score(0, 0, 3) < evaluator.base_score(0, 0, 1));
    }

    #[test]
    fn test_single_triple_ranks_first() {
        let evaluator = evaluator(PathEvidence::default());
        let report = evaluator.evaluate(&[Triple::new(0, 0, 1)]);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.gaps, 0);
        assert_eq!(report.tail.filtered.mean_rank, 1.0);
        assert_eq!(report.tail.filtered.hits, 1.0);
        assert_eq!(report.head.filtered.hits, 1.0);
        assert_eq!(report.relation.unwrap().filtered.count, 1);
    }

    #[test]
    fn test_inverse_triple_is_canonicalized() {
        let evaluator = evaluator(PathEvidence::default());
        let report = evaluator.evaluate(&[Triple::new(1, 1, 0)]);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.tail.raw.mean_rank, 1.0);
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let evaluator = evaluator(PathEvidence::default());
        let report = evaluator.evaluate(&[Triple::new(9, 0, 1), Triple::new(0, 5, 1)]);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.tail.raw.count, 0);
    }

    #[test]
    fn test_path_penalty_uses_confident_paths() {
        let mut resources = PathResourceTable::new();
        // (A, C) is linked by the inverse relation path, which disagrees with R
        resources.insert(
            EntityPair::new(0, 2),
            vec![PathShare::new(RelationPath::single(1), 1.0)],
        );
        let mut confidences = ConfidenceTable::new();
        confidences.insert(RelationPath::single(1), 0, 0.5);
        let evaluator = evaluator(PathEvidence::new(resources, confidences));

        // |0.5 - (-0.5)| = 1.0, weighted by share 1.0 and confidence 0.5
        assert!((evaluator.path_penalty(0, 0, 2) - 0.5).abs() < 1e-6);
        assert_eq!(evaluator.path_penalty(0, 0, 1), 0.0);
        assert!(evaluator.boosted_score(0, 0, 2) < evaluator.base_score(0, 0, 2));
    }

    #[test]
    fn test_rerank_reorders_top_candidates_only() {
        let mut resources = PathResourceTable::new();
        let mut confidences = ConfidenceTable::new();
        // B: R > R^-1 sums to (-1, 0), far from R
        resources.insert(
            EntityPair::new(0, 1),
            vec![PathShare::new(RelationPath::compose(1, 1), 1.0)],
        );
        confidences.insert(RelationPath::compose(1, 1), 0, 1.0);
        // C: a NaN confidence poisons its boosted score
        resources.insert(
            EntityPair::new(0, 2),
            vec![PathShare::new(RelationPath::single(0), 1.0)],
        );
        confidences.insert(RelationPath::single(0), 0, f32::NAN);
        // D: would be penalized, but sits outside the top 3
        resources.insert(
            EntityPair::new(0, 3),
            vec![PathShare::new(RelationPath::single(1), 1.0)],
        );
        confidences.insert(RelationPath::single(1), 0, 1.0);

        let config = EvalConfig::default().with_rerank_top_k(3);
        let evaluator = evaluator_with(config, PathEvidence::new(resources, confidences));

        // base order: B (0.0), A (-1.0), C (-2.0), D (-2.0)
        assert_eq!(evaluator.base_score(0, 0, 1), 0.0);
        assert_eq!(evaluator.base_score(0, 0, 0), -1.0);
        assert_eq!(evaluator.base_score(0, 0, 3), -2.0);

        let scores = evaluator.score_candidates(0, 0, 1, Slot::Tail);
        assert_eq!(scores.scores[0], Some(-1.0));
        assert_eq!(scores.scores[1], Some(-1.5));
        assert_eq!(scores.scores[2], None);
        assert_eq!(scores.scores[3], Some(evaluator.base_score(0, 0, 3)));
        assert!(evaluator.boosted_score(0, 0, 3) < evaluator.base_score(0, 0, 3));
        assert_eq!(scores.gaps, 1);

        let ranked: Vec<usize> = scores.ranked().into_iter().map(|(c, _)| c).collect();
        assert_eq!(ranked, vec![0, 1, 3]);

        let report = evaluator.evaluate(&[Triple::new(0, 0, 1)]);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.gaps, 1);
        assert_eq!(report.tail.raw.mean_rank, 2.0);
        assert_eq!(report.tail.filtered.mean_rank, 2.0);
    }

    #[test]
    fn test_paths_with_unknown_relations_are_dropped() {
        let mut resources = PathResourceTable::new();
        resources.insert(
            EntityPair::new(0, 1),
            vec![
                PathShare::new(RelationPath::single(7), 1.0),
                PathShare::new(RelationPath::compose(0, 1), 0.5),
            ],
        );
        let mut confidences = ConfidenceTable::new();
        confidences.insert(RelationPath::single(7), 0, 0.5);
        let evaluator = evaluator(PathEvidence::new(resources, confidences));

        let kept = evaluator.evidence.resources.get(&EntityPair::new(0, 1));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].path, RelationPath::compose(0, 1));
        assert_eq!(evaluator.path_penalty(0, 0, 1), 0.0);

        let report = evaluator.evaluate(&[Triple::new(0, 0, 1)]);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.gaps, 0);
        assert_eq!(report.tail.filtered.mean_rank, 1.0);
    }

    #[test]
    fn test_records_fill_missing_pairs() {
        let record = PathRecord::new(
            Triple::new(0, 0, 3),
            vec![PathShare::new(RelationPath::single(0), 1.0)],
        );
        let evidence = PathEvidence::default().with_records([&record]);
        assert!(evidence.resources.contains(&EntityPair::new(0, 3)));
    }

    #[test]
    fn test_report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let report = evaluator(PathEvidence::default()).evaluate(&[Triple::new(0, 0, 1)]);
        report.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: EvalReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.evaluated, 1);
    }

    #[test]
    fn test_relation_count_mismatch_is_rejected() {
        let entities = EmbeddingTable::zeros(2, 2);
        let relations = EmbeddingTable::zeros(3, 2);
        let embeddings = Embeddings::new(entities, relations).unwrap();
        let result = Evaluator::new(
            EvalConfig::default(),
            Distance::L1,
            embeddings,
            PathEvidence::default(),
            PositiveTriples::new(),
            1,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
