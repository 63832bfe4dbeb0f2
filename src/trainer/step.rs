//! Margin losses and their gradient updates for one sample

use crate::embedding::{Distance, EmbeddingTable, WriteBuffer};
use crate::types::{RelationId, Triple};

/// Read tables, write buffers and step constants shared by one mini-batch
pub(crate) struct Step<'a> {
    pub entities: &'a EmbeddingTable,
    pub relations: &'a EmbeddingTable,
    pub entity_writes: &'a WriteBuffer,
    pub relation_writes: &'a WriteBuffer,
    pub distance: Distance,
    pub learning_rate: f32,
    pub margin: f32,
    pub path_margin: f32,
}

impl Step<'_> {
    pub fn triple_distance(&self, triple: Triple) -> f32 {
        self.distance.triple(
            self.entities.row(triple.head),
            self.relations.row(triple.relation),
            self.entities.row(triple.tail),
        )
    }

    pub fn path_distance(&self, relation: RelationId, path: &[RelationId]) -> f32 {
        self.distance
            .path(self.relations.row(relation), self.relations, path)
    }

    /// Hinge loss between a positive triple and its corruption
    ///
    /// Returns the violation (0 when the margin is already satisfied).
    pub fn triple_loss(&self, positive: Triple, negative: Triple) -> f32 {
        let positive_distance = self.triple_distance(positive);
        let negative_distance = self.triple_distance(negative);
        let violation = positive_distance + self.margin - negative_distance;
        if violation <= 0.0 {
            return 0.0;
        }
        self.update_triple(positive, -1.0);
        self.update_triple(negative, 1.0);
        violation
    }

    /// Weighted hinge loss between `relation` and a corrupted relation, both
    /// measured against the composition of `path`
    pub fn path_loss(
        &self,
        relation: RelationId,
        corrupted: RelationId,
        path: &[RelationId],
        weight: f32,
    ) -> f32 {
        if path.is_empty() {
            return 0.0;
        }
        let positive_distance = self.path_distance(relation, path);
        let negative_distance = self.path_distance(corrupted, path);
        let violation = positive_distance + self.path_margin - negative_distance;
        if violation <= 0.0 {
            return 0.0;
        }
        self.update_path(relation, path, -weight);
        self.update_path(corrupted, path, weight);
        weight * violation
    }

    /// `delta = -1` pulls `t - h - r` towards 0, `delta = 1` pushes it away
    fn update_triple(&self, triple: Triple, delta: f32) {
        let head = self.entities.row(triple.head);
        let relation = self.relations.row(triple.relation);
        let tail = self.entities.row(triple.tail);
        let gradient: Vec<f32> = (0..head.len())
            .map(|k| self.distance.gradient(tail[k] - head[k] - relation[k]))
            .collect();
        let step = delta * self.learning_rate;

        self.relation_writes.update(triple.relation, |row| {
            for (value, g) in row.iter_mut().zip(&gradient) {
                *value -= step * g;
            }
        });
        self.entity_writes.update(triple.head, |row| {
            for (value, g) in row.iter_mut().zip(&gradient) {
                *value -= step * g;
            }
        });
        self.entity_writes.update(triple.tail, |row| {
            for (value, g) in row.iter_mut().zip(&gradient) {
                *value += step * g;
            }
        });
    }

    /// `delta < 0` pulls `r - sum(path)` towards 0, `delta > 0` pushes it away
    fn update_path(&self, relation: RelationId, path: &[RelationId], delta: f32) {
        let target = self.relations.row(relation);
        let gradient: Vec<f32> = (0..target.len())
            .map(|k| {
                let composed: f32 = path.iter().map(|&p| self.relations.row(p)[k]).sum();
                self.distance.gradient(target[k] - composed)
            })
            .collect();
        let step = delta * self.learning_rate;
        let share = step / path.len() as f32;

        self.relation_writes.update(relation, |row| {
            for (value, g) in row.iter_mut().zip(&gradient) {
                *value += step * g;
            }
        });
        for &hop in path {
            self.relation_writes.update(hop, |row| {
                for (value, g) in row.iter_mut().zip(&gradient) {
                    *value -= share * g;
                }
            });
        }
    }
}
