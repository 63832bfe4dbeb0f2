//! Base and path-boosted triple scores, candidate ranking

use std::cmp::Ordering;

use super::Evaluator;
use crate::graph::inverse_relation;
use crate::types::{EntityId, EntityPair, RelationId};

/// Which element of a held-out triple is being predicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Head,
    Tail,
    Relation,
}

/// Scores of every candidate for one slot; `None` marks non-finite scores
pub(crate) struct CandidateScores {
    pub scores: Vec<Option<f32>>,
    pub gaps: usize,
}

impl Evaluator {
    /// `-(d(h, r, t) + d(t, r^-1, h))`; higher is more plausible
    pub fn base_score(&self, head: EntityId, relation: RelationId, tail: EntityId) -> f32 {
        let entities = &self.embeddings.entities;
        let relations = &self.embeddings.relations;
        let inverse = inverse_relation(relation, self.base_relation_count);

        let forward = self.distance.triple(
            entities.row(head),
            relations.row(relation),
            entities.row(tail),
        );
        let backward = self.distance.triple(
            entities.row(tail),
            relations.row(inverse),
            entities.row(head),
        );
        -(forward + backward)
    }

    /// Weighted disagreement between `relation` and the paths linking the pair,
    /// in both directions
    pub fn path_penalty(&self, head: EntityId, relation: RelationId, tail: EntityId) -> f32 {
        let inverse = inverse_relation(relation, self.base_relation_count);
        self.pair_penalty(EntityPair::new(head, tail), relation)
            + self.pair_penalty(EntityPair::new(tail, head), inverse)
    }

    /// Base score minus the path penalty
    pub fn boosted_score(&self, head: EntityId, relation: RelationId, tail: EntityId) -> f32 {
        self.base_score(head, relation, tail) - self.path_penalty(head, relation, tail)
    }

    fn pair_penalty(&self, pair: EntityPair, relation: RelationId) -> f32 {
        let relations = &self.embeddings.relations;
        self.evidence
            .resources
            .get(&pair)
            .iter()
            .filter_map(|share| {
                let confidence = self.evidence.confidences.get(&share.path, relation)?;
                let disagreement = self.distance.path(
                    relations.row(relation),
                    relations,
                    share.path.relations(),
                );
                Some(share.share * confidence * disagreement)
            })
            .sum()
    }

    /// Score every candidate for `slot`, re-scoring the best `rerank_top_k`
    /// by base score with path evidence
    pub(crate) fn score_candidates(
        &self,
        head: EntityId,
        relation: RelationId,
        tail: EntityId,
        slot: Slot,
    ) -> CandidateScores {
        let candidate_count = match slot {
            Slot::Head | Slot::Tail => self.embeddings.entities.len(),
            Slot::Relation => self.base_relation_count,
        };
        let triple_for = |candidate: usize| match slot {
            Slot::Head => (candidate, relation, tail),
            Slot::Tail => (head, relation, candidate),
            Slot::Relation => (head, candidate, tail),
        };

        let mut gaps = 0;
        let mut scores: Vec<Option<f32>> = (0..candidate_count)
            .map(|candidate| {
                let (h, r, t) = triple_for(candidate);
                let score = self.base_score(h, r, t);
                if score.is_finite() {
                    Some(score)
                } else {
                    gaps += 1;
                    None
                }
            })
            .collect();

        let mut order: Vec<usize> = (0..candidate_count)
            .filter(|&candidate| scores[candidate].is_some())
            .collect();
        order.sort_by(|&a, &b| descending(scores[a], scores[b]));

        for &candidate in order.iter().take(self.config.rerank_top_k) {
            let (h, r, t) = triple_for(candidate);
            let boosted = self.boosted_score(h, r, t);
            if boosted.is_finite() {
                scores[candidate] = Some(boosted);
            } else {
                scores[candidate] = None;
                gaps += 1;
            }
        }

        CandidateScores { scores, gaps }
    }
}

impl CandidateScores {
    /// Raw and filtered 1-based rank of `target`, counting only candidates
    /// with a strictly greater score; `None` if the target itself has no score
    pub fn rank<F>(&self, target: usize, is_known: F) -> Option<(usize, usize)>
    where
        F: Fn(usize) -> bool,
    {
        let target_score = self.scores.get(target).copied().flatten()?;
        let mut raw = 1;
        let mut filtered = 1;
        for (candidate, score) in self.scores.iter().enumerate() {
            if candidate == target {
                continue;
            }
            if let Some(score) = score {
                if *score > target_score {
                    raw += 1;
                    if !is_known(candidate) {
                        filtered += 1;
                    }
                }
            }
        }
        Some((raw, filtered))
    }

    /// Candidates with a score, best first
    pub fn ranked(&self) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self
            .scores
            .iter()
            .enumerate()
            .filter_map(|(candidate, score)| score.map(|s| (candidate, s)))
            .collect();
        ranked.sort_by(|a, b| descending(Some(a.1), Some(b.1)).then(a.0.cmp(&b.0)));
        ranked
    }
}

fn descending(a: Option<f32>, b: Option<f32>) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_counts_strictly_greater() {
        let scores = CandidateScores {
            scores: vec![Some(0.5), Some(0.9), Some(0.5), None, Some(0.1)],
            gaps: 1,
        };
        // candidate 1 outranks 0; 2 ties and does not
        assert_eq!(scores.rank(0, |_| false), Some((2, 2)));
        assert_eq!(scores.rank(0, |c| c == 1), Some((2, 1)));
        assert_eq!(scores.rank(3, |_| false), None);

        let ranked: Vec<usize> = scores.ranked().into_iter().map(|(c, _)| c).collect();
        assert_eq!(ranked, vec![1, 0, 2, 4]);
    }
}
