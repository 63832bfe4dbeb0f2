//! Ranked candidate listings for inspection

use serde::{Deserialize, Serialize};

use super::scorer::Slot;
use super::Evaluator;
use crate::embedding::cosine;
use crate::error::{Error, Result};
use crate::graph::inverse_relation;
use crate::types::{EntityId, RelationId};

/// One predicted tail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity: EntityId,
    pub score: f32,
    /// The predicted triple is already a known positive
    pub in_sample: bool,
}

impl Evaluator {
    /// Best `n` tails for `(head, relation, ?)`
    ///
    /// With `filter` set, known positives are dropped instead of flagged.
    /// Inverse relations are answered through their base form.
    pub fn top_tails(
        &self,
        head: EntityId,
        relation: RelationId,
        n: usize,
        filter: bool,
    ) -> Result<Vec<Candidate>> {
        self.check_entity(head)?;
        if relation >= 2 * self.base_relation_count {
            return Err(Error::MissingRelation(format!("#{relation}")));
        }

        let inverted = relation >= self.base_relation_count;
        let base = inverse_relation(relation, self.base_relation_count);
        let scores = if inverted {
            self.score_candidates(0, base, head, Slot::Head)
        } else {
            self.score_candidates(head, relation, 0, Slot::Tail)
        };
        let is_known = |entity: EntityId| {
            if inverted {
                self.known.contains(entity, base, head)
            } else {
                self.known.contains(head, relation, entity)
            }
        };

        Ok(scores
            .ranked()
            .into_iter()
            .map(|(entity, score)| Candidate {
                entity,
                score,
                in_sample: is_known(entity),
            })
            .filter(|candidate| !(filter && candidate.in_sample))
            .take(n)
            .collect())
    }

    /// The `n` entities closest to `entity` by cosine similarity, itself excluded
    pub fn similar_entities(&self, entity: EntityId, n: usize) -> Result<Vec<(EntityId, f32)>> {
        self.check_entity(entity)?;
        let entities = &self.embeddings.entities;
        let query = entities.row(entity);

        let mut similar: Vec<(EntityId, f32)> = (0..entities.len())
            .filter(|&other| other != entity)
            .map(|other| (other, cosine(query, entities.row(other))))
            .filter(|(_, similarity)| similarity.is_finite())
            .collect();
        similar.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        similar.truncate(n);
        Ok(similar)
    }

    fn check_entity(&self, entity: EntityId) -> Result<()> {
        if entity >= self.entity_count() {
            return Err(Error::MissingEntity(format!("#{entity}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Distance, EmbeddingTable, Embeddings};
    use crate::eval::{EvalConfig, PathEvidence};
    use crate::graph::PositiveTriples;
    use crate::types::Triple;

    fn evaluator() -> Evaluator {
        let entities = EmbeddingTable::from_rows(vec![
            vec![0.0, 0.0],
            vec![0.5, 0.0],
            vec![0.4, 0.1],
            vec![-0.5, 0.0],
        ])
        .unwrap();
        let relations =
            EmbeddingTable::from_rows(vec![vec![0.5, 0.0], vec![-0.5, 0.0]]).unwrap();
        let known: PositiveTriples = vec![Triple::new(0, 0, 1)].into_iter().collect();
        Evaluator::new(
            EvalConfig::default(),
            Distance::L1,
            Embeddings::new(entities, relations).unwrap(),
            PathEvidence::default(),
            known,
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_top_tails_flags_known_positives() {
        let evaluator = evaluator();
        let tails = evaluator.top_tails(0, 0, 2, false).unwrap();
        assert_eq!(tails[0].entity, 1);
        assert!(tails[0].in_sample);
        assert_eq!(tails[1].entity, 2);
        assert!(!tails[1].in_sample);

        let filtered = evaluator.top_tails(0, 0, 2, true).unwrap();
        assert_eq!(filtered[0].entity, 2);
        assert!(filtered.iter().all(|c| !c.in_sample));
    }

    #[test]
    fn test_inverse_relation_listing() {
        // (B, R^-1, ?) should point back to A
        let tails = evaluator().top_tails(1, 1, 1, false).unwrap();
        assert_eq!(tails[0].entity, 0);
        assert!(tails[0].in_sample);
    }

    #[test]
    fn test_similar_entities() {
        let evaluator = evaluator();
        let similar = evaluator.similar_entities(1, 2).unwrap();
        assert_eq!(similar.len(), 2);
        assert_eq!(similar[0].0, 2);
        assert!(similar[0].1 > similar[1].1);
        assert!(evaluator.similar_entities(7, 2).is_err());
    }
}
