//! Negative sampling by corruption

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::PositiveTriples;
use crate::types::{RelationId, Triple};

/// Which element of a positive triple gets replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    Head,
    Tail,
    Relation,
}

/// Relative weights of the three corruption kinds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorruptionMix {
    pub head: f64,
    pub tail: f64,
    pub relation: f64,
}

impl Default for CorruptionMix {
    fn default() -> Self {
        Self {
            head: 0.25,
            tail: 0.25,
            relation: 0.5,
        }
    }
}

impl CorruptionMix {
    pub fn new(head: f64, tail: f64, relation: f64) -> Self {
        Self {
            head,
            tail,
            relation,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [self.head, self.tail, self.relation];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(Error::Config(format!(
                "corruption weights must be non-negative with a positive sum: {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Corruption {
        let total = self.head + self.tail + self.relation;
        let draw = rng.random::<f64>() * total;
        if draw < self.head {
            Corruption::Head
        } else if draw < self.head + self.tail || self.relation == 0.0 {
            Corruption::Tail
        } else {
            Corruption::Relation
        }
    }
}

/// Draws replacements until the corrupted triple is not a known positive
pub struct NegativeSampler<'a> {
    positives: &'a PositiveTriples,
    entity_count: usize,
    relation_count: usize,
    max_attempts: usize,
}

impl<'a> NegativeSampler<'a> {
    pub fn new(
        positives: &'a PositiveTriples,
        entity_count: usize,
        relation_count: usize,
        max_attempts: usize,
    ) -> Self {
        Self {
            positives,
            entity_count,
            relation_count,
            max_attempts,
        }
    }

    /// Replace one element of `triple`, never returning a positive triple
    pub fn corrupt<R: Rng + ?Sized>(
        &self,
        triple: Triple,
        kind: Corruption,
        rng: &mut R,
    ) -> Result<Triple> {
        match kind {
            Corruption::Head => self.search(triple, rng, |rng| {
                Triple::new(rng.random_range(0..self.entity_count), triple.relation, triple.tail)
            }),
            Corruption::Tail => self.search(triple, rng, |rng| {
                Triple::new(triple.head, triple.relation, rng.random_range(0..self.entity_count))
            }),
            Corruption::Relation => self
                .corrupt_relation(triple, rng)
                .map(|relation| Triple::new(triple.head, relation, triple.tail)),
        }
    }

    /// A relation `r'` such that `(head, r', tail)` is not positive
    pub fn corrupt_relation<R: Rng + ?Sized>(
        &self,
        triple: Triple,
        rng: &mut R,
    ) -> Result<RelationId> {
        self.search(triple, rng, |rng| {
            Triple::new(triple.head, rng.random_range(0..self.relation_count), triple.tail)
        })
        .map(|corrupted| corrupted.relation)
    }

    fn search<R, F>(&self, seed: Triple, rng: &mut R, mut draw: F) -> Result<Triple>
    where
        R: Rng + ?Sized,
        F: FnMut(&mut R) -> Triple,
    {
        if self.entity_count > 0 && self.relation_count > 0 {
            for _ in 0..self.max_attempts {
                let candidate = draw(rng);
                if !self.positives.contains_triple(&candidate) {
                    return Ok(candidate);
                }
            }
        }
        Err(Error::CorruptionExhausted {
            head: seed.head,
            relation: seed.relation,
            tail: seed.tail,
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn test_corruption_avoids_positives() {
        let positives: PositiveTriples = vec![
            Triple::new(0, 0, 1),
            Triple::new(0, 0, 2),
            Triple::new(2, 0, 1),
        ]
        .into_iter()
        .collect();
        let sampler = NegativeSampler::new(&positives, 4, 2, 100);
        let mut rng = XorShiftRng::seed_from_u64(3);

        for kind in [Corruption::Head, Corruption::Tail, Corruption::Relation] {
            for _ in 0..200 {
                let negative = sampler.corrupt(Triple::new(0, 0, 1), kind, &mut rng).unwrap();
                assert!(!positives.contains_triple(&negative));
            }
        }
    }

    #[test]
    fn test_exhaustion_is_reported() {
        // the only tails available are all positive
        let positives: PositiveTriples =
            vec![Triple::new(0, 0, 0), Triple::new(0, 0, 1)].into_iter().collect();
        let sampler = NegativeSampler::new(&positives, 2, 1, 25);
        let mut rng = XorShiftRng::seed_from_u64(1);

        let err = sampler
            .corrupt(Triple::new(0, 0, 1), Corruption::Tail, &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::CorruptionExhausted { attempts: 25, .. }));
    }

    #[test]
    fn test_mix_respects_zero_weights() {
        let mut rng = XorShiftRng::seed_from_u64(9);
        let tails_only = CorruptionMix::new(0.0, 1.0, 0.0);
        for _ in 0..100 {
            assert_eq!(tails_only.choose(&mut rng), Corruption::Tail);
        }
        assert!(CorruptionMix::new(-1.0, 1.0, 1.0).validate().is_err());
    }
}
