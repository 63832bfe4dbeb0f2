//! Embedding storage and vector math
//!
//! Vectors live in a flat row-major arena, one fixed-width row per entity or
//! relation id. Every committed row has an L2 norm of at most 1.

mod buffer;

use std::path::Path;

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::{read_vectors, write_vectors};

pub use buffer::WriteBuffer;

/// Fixed-width float rows indexed by id
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingTable {
    /// `rows` zero vectors of width `dim`
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    /// Draw every component from `Uniform(-6/sqrt(dim), 6/sqrt(dim))` and cap
    /// each row's norm at 1
    pub fn random<R: Rng + ?Sized>(rows: usize, dim: usize, rng: &mut R) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        let bound = 6.0 / (dim as f32).sqrt();
        let uniform = Uniform::new(-bound, bound)
            .map_err(|e| Error::Config(format!("initialisation range: {}", e)))?;

        let mut table = Self {
            dim,
            data: (0..rows * dim).map(|_| uniform.sample(rng)).collect(),
        };
        for row in table.data.chunks_mut(dim) {
            cap_norm(row);
        }
        Ok(table)
    }

    /// Build a table from explicit rows of equal width
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(Vec::len).unwrap_or(1);
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (id, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(Error::Config(format!(
                    "row {} has {} components, expected {}",
                    id,
                    row.len(),
                    dim
                )));
            }
            data.extend(row);
        }
        Self::from_flat(dim, data)
    }

    /// Wrap a row-major buffer
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::Config(format!(
                "{} values do not form rows of width {}",
                data.len(),
                dim
            )));
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.len() / self.dim.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, id: usize) -> &[f32] {
        &self.data[id * self.dim..(id + 1) * self.dim]
    }

    pub fn get(&self, id: usize) -> Option<&[f32]> {
        if id < self.len() {
            Some(self.row(id))
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks(self.dim)
    }

    pub(crate) fn as_flat_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// First row holding a NaN or infinity
    pub fn find_non_finite(&self) -> Option<usize> {
        self.rows().position(|row| row.iter().any(|v| !v.is_finite()))
    }
}

/// Euclidean norm
pub fn l2_norm(x: &[f32]) -> f32 {
    x.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Scale `x` down to unit norm if it is longer than 1
pub fn cap_norm(x: &mut [f32]) {
    let norm = l2_norm(x);
    if norm > 1.0 {
        for v in x.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity, 0 when either vector is zero
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norms = l2_norm(a) * l2_norm(b);
    if norms > 0.0 {
        dot / norms
    } else {
        0.0
    }
}

/// Translation distance used for both scoring and gradients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    L1,
    SquaredL2,
}

impl Distance {
    /// Distance of one residual component
    #[inline]
    pub fn component(self, x: f32) -> f32 {
        match self {
            Distance::L1 => x.abs(),
            Distance::SquaredL2 => x * x,
        }
    }

    /// Derivative of [`component`](Self::component) with respect to `x`
    #[inline]
    pub fn gradient(self, x: f32) -> f32 {
        match self {
            Distance::L1 if x > 0.0 => 1.0,
            Distance::L1 if x < 0.0 => -1.0,
            Distance::L1 => 0.0,
            Distance::SquaredL2 => 2.0 * x,
        }
    }

    /// `d(h, r, t)` over the residual `t - h - r`
    pub fn triple(self, head: &[f32], relation: &[f32], tail: &[f32]) -> f32 {
        head.iter()
            .zip(relation)
            .zip(tail)
            .map(|((h, r), t)| self.component(t - h - r))
            .sum()
    }

    /// `d(r, path)` over the residual `r - sum(path)`
    pub fn path(self, relation: &[f32], relations: &EmbeddingTable, path: &[usize]) -> f32 {
        (0..relation.len())
            .map(|k| {
                let composed: f32 = path.iter().map(|&p| relations.row(p)[k]).sum();
                self.component(relation[k] - composed)
            })
            .sum()
    }
}

/// Entity and relation tables of one model
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub entities: EmbeddingTable,
    /// Base relations followed by their inverses
    pub relations: EmbeddingTable,
}

impl Embeddings {
    pub fn new(entities: EmbeddingTable, relations: EmbeddingTable) -> Result<Self> {
        if entities.dim() != relations.dim() {
            return Err(Error::Config(format!(
                "entity dimension {} differs from relation dimension {}",
                entities.dim(),
                relations.dim()
            )));
        }
        Ok(Self {
            entities,
            relations,
        })
    }

    pub fn dim(&self) -> usize {
        self.entities.dim()
    }

    /// Write `entity2vec` and `relation2vec`
    pub fn save(&self, entity_path: &Path, relation_path: &Path) -> Result<()> {
        write_vectors(entity_path, &self.entities)?;
        write_vectors(relation_path, &self.relations)
    }

    /// Read `entity2vec` and `relation2vec`, checking row counts
    pub fn load(
        entity_path: &Path,
        relation_path: &Path,
        entity_count: usize,
        relation_count: usize,
    ) -> Result<Self> {
        let entities = read_vectors(entity_path, entity_count)?;
        let relations = read_vectors(relation_path, relation_count)?;
        Self::new(entities, relations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn test_random_rows_are_capped() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let table = EmbeddingTable::random(50, 4, &mut rng).unwrap();
        assert_eq!(table.len(), 50);
        for row in table.rows() {
            assert!(l2_norm(row) <= 1.0 + 1e-6);
        }
        assert!(EmbeddingTable::random(3, 0, &mut rng).is_err());
    }

    #[test]
    fn test_cap_norm_leaves_short_vectors() {
        let mut short = [0.3, 0.4];
        cap_norm(&mut short);
        assert_eq!(short, [0.3, 0.4]);

        let mut long = [3.0, 4.0];
        cap_norm(&mut long);
        assert!((long[0] - 0.6).abs() < 1e-6);
        assert!((long[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_distances() {
        let h = [0.0, 0.0];
        let r = [0.5, 0.0];
        let t = [1.0, -1.0];
        assert!((Distance::L1.triple(&h, &r, &t) - 1.5).abs() < 1e-6);
        assert!((Distance::SquaredL2.triple(&h, &r, &t) - 1.25).abs() < 1e-6);

        assert_eq!(Distance::L1.gradient(-0.2), -1.0);
        assert_eq!(Distance::L1.gradient(0.0), 0.0);
        assert_eq!(Distance::SquaredL2.gradient(0.25), 0.5);
    }

    #[test]
    fn test_path_distance() {
        let relations =
            EmbeddingTable::from_rows(vec![vec![0.5, 0.0], vec![0.0, 0.5], vec![0.5, 0.5]])
                .unwrap();
        let d = Distance::L1.path(relations.row(2), &relations, &[0, 1]);
        assert!(d.abs() < 1e-6);
        let d = Distance::L1.path(relations.row(0), &relations, &[1]);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_shape_checks() {
        assert!(EmbeddingTable::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(EmbeddingTable::from_flat(3, vec![0.0; 4]).is_err());
        let table = EmbeddingTable::zeros(2, 3);
        assert!(table.get(2).is_none());
        assert_eq!(table.find_non_finite(), None);
    }
}
