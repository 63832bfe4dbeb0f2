//! Rank-based metrics

use serde::{Deserialize, Serialize};

/// Mean rank, MRR and hits@N over one set of ranks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankMetrics {
    /// E\[rank\]
    pub mean_rank: f64,
    /// E\[1/rank\]
    pub mrr: f64,
    /// P(rank <= hits_at)
    pub hits: f64,
    pub hits_at: usize,
    pub count: usize,
}

impl RankMetrics {
    /// Metrics over 1-based ranks
    pub fn from_ranks(ranks: &[usize], hits_at: usize) -> Self {
        if ranks.is_empty() {
            return Self {
                hits_at,
                ..Self::default()
            };
        }

        let n = ranks.len() as f64;
        Self {
            mean_rank: ranks.iter().map(|&r| r as f64).sum::<f64>() / n,
            mrr: ranks.iter().map(|&r| 1.0 / r as f64).sum::<f64>() / n,
            hits: ranks.iter().filter(|&&r| r <= hits_at).count() as f64 / n,
            hits_at,
            count: ranks.len(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "MR: {:.1} | MRR: {:.4} | H@{}: {:.3} (n={})",
            self.mean_rank, self.mrr, self.hits_at, self.hits, self.count
        )
    }
}

/// Raw and filtered metrics for one ranking direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionMetrics {
    pub raw: RankMetrics,
    pub filtered: RankMetrics,
}

impl DirectionMetrics {
    /// `ranks` holds `(raw, filtered)` pairs
    pub fn from_ranks(ranks: &[(usize, usize)], hits_at: usize) -> Self {
        let raw: Vec<usize> = ranks.iter().map(|(raw, _)| *raw).collect();
        let filtered: Vec<usize> = ranks.iter().map(|(_, filtered)| *filtered).collect();
        Self {
            raw: RankMetrics::from_ranks(&raw, hits_at),
            filtered: RankMetrics::from_ranks(&filtered, hits_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ranks() {
        let metrics = RankMetrics::from_ranks(&[1, 2, 4, 20], 3);
        assert_eq!(metrics.count, 4);
        assert!((metrics.mean_rank - 6.75).abs() < 1e-9);
        assert!((metrics.mrr - (1.0 + 0.5 + 0.25 + 0.05) / 4.0).abs() < 1e-9);
        assert!((metrics.hits - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_ranks() {
        let metrics = RankMetrics::from_ranks(&[], 10);
        assert_eq!(metrics.count, 0);
        assert_eq!(metrics.hits_at, 10);
        assert_eq!(metrics.mrr, 0.0);
    }

    #[test]
    fn test_direction_split() {
        let direction = DirectionMetrics::from_ranks(&[(3, 1), (1, 1)], 1);
        assert!((direction.raw.hits - 0.5).abs() < 1e-9);
        assert!((direction.filtered.hits - 1.0).abs() < 1e-9);
        assert!(direction.raw.summary().contains("H@1"));
    }
}
