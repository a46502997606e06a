//! Count-based n-gram model with additive smoothing.
//!
//! Used to build the unigram distribution that weights control-set sampling.

use std::collections::HashMap;

use corpus::NgramMatrix;

use crate::error::HarnessError;
use crate::training::control::DistributionVector;

/// `p(x_0 | x_1..x_{n-1}) = (c(x) + λ) / (c(x_1..x_{n-1}) + λ·V)`.
///
/// An unseen context with `λ = 0` scores 0.
#[derive(Debug, Clone)]
pub struct NgramModel {
    n: usize,
    vocab_size: usize,
    lambda: f64,
    counts: HashMap<Vec<u32>, u64>,
    context_counts: HashMap<Vec<u32>, u64>,
}

impl NgramModel {
    /// Count every row of `matrix`.
    pub fn fit(matrix: &NgramMatrix, vocab_size: usize, lambda: f64) -> anyhow::Result<Self> {
        if !(lambda >= 0.0 && lambda.is_finite()) {
            anyhow::bail!("smoothing must be a finite non-negative number, got {lambda}");
        }
        matrix.validate(vocab_size)?;

        let mut counts: HashMap<Vec<u32>, u64> = HashMap::new();
        let mut context_counts: HashMap<Vec<u32>, u64> = HashMap::new();
        for row in matrix.rows() {
            *counts.entry(row.to_vec()).or_default() += 1;
            *context_counts.entry(row[1..].to_vec()).or_default() += 1;
        }
        tracing::debug!(
            rows = matrix.len(),
            distinct = counts.len(),
            contexts = context_counts.len(),
            "Fitted n-gram counts"
        );
        Ok(Self {
            n: matrix.n(),
            vocab_size,
            lambda,
            counts,
            context_counts,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Smoothed conditional probability of every row.
    pub fn probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        if batch.n() != self.n {
            anyhow::bail!("batch has n-gram order {}, model has {}", batch.n(), self.n);
        }
        let smoothing_mass = self.lambda * self.vocab_size as f64;
        Ok(batch
            .rows()
            .map(|row| {
                let joint = self.counts.get(row).copied().unwrap_or(0) as f64;
                let context = self.context_counts.get(&row[1..]).copied().unwrap_or(0) as f64;
                let denominator = context + smoothing_mass;
                if denominator == 0.0 {
                    0.0
                } else {
                    (joint + self.lambda) / denominator
                }
            })
            .collect())
    }

    /// Empirical distribution of the conditioned term (column 0) of `matrix`.
    pub fn unigram_distribution(
        matrix: &NgramMatrix,
        vocab_size: usize,
    ) -> Result<DistributionVector, HarnessError> {
        let column = NgramMatrix::new(matrix.column(0), 1)?;
        let unigram = Self::fit(&column, vocab_size, 0.0)?;
        let vocabulary = NgramMatrix::new((0..vocab_size as u32).collect(), 1)?;
        let weights = unigram.probability(&vocabulary)?;
        DistributionVector::from_weights(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsmoothed_bigram() {
        let m = NgramMatrix::from_rows(&[vec![1, 0], vec![1, 0], vec![2, 0], vec![0, 1]]).unwrap();
        let model = NgramModel::fit(&m, 3, 0.0).unwrap();
        let batch = NgramMatrix::from_rows(&[vec![1, 0], vec![2, 0], vec![0, 0], vec![0, 2]]).unwrap();
        let p = model.probability(&batch).unwrap();
        assert!((p[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((p[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(p[2], 0.0);
        // Unseen context.
        assert_eq!(p[3], 0.0);
    }

    #[test]
    fn test_smoothing_sums_to_one_per_context() {
        let m = NgramMatrix::from_rows(&[vec![1, 0], vec![1, 0], vec![2, 0]]).unwrap();
        let model = NgramModel::fit(&m, 4, 0.5).unwrap();
        for context in 0..4u32 {
            let rows: Vec<Vec<u32>> = (0..4).map(|v| vec![v, context]).collect();
            let total: f64 = model.probability(&NgramMatrix::from_rows(&rows).unwrap()).unwrap().iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "context {context}: {total}");
        }
    }

    #[test]
    fn test_unigram_distribution() {
        let m = NgramMatrix::from_rows(&[vec![0, 5], vec![2, 1], vec![2, 3], vec![2, 0]]).unwrap();
        let dist = NgramModel::unigram_distribution(&m, 6).unwrap();
        assert_eq!(dist.len(), 6);
        assert!((dist.probs()[0] - 0.25).abs() < 1e-12);
        assert!((dist.probs()[2] - 0.75).abs() < 1e-12);
        assert_eq!(dist.probs()[5], 0.0);
    }

    #[test]
    fn test_unigram_distribution_of_empty_matrix_fails() {
        let err = NgramModel::unigram_distribution(&NgramMatrix::empty(3).unwrap(), 4).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidDistribution(_)));
    }

    #[test]
    fn test_rejects_bad_input() {
        let m = NgramMatrix::from_rows(&[vec![7, 0]]).unwrap();
        assert!(NgramModel::fit(&m, 4, 0.0).is_err());
        let ok = NgramMatrix::from_rows(&[vec![1, 0]]).unwrap();
        assert!(NgramModel::fit(&ok, 4, -1.0).is_err());
        let model = NgramModel::fit(&ok, 4, 0.0).unwrap();
        assert!(model.probability(&NgramMatrix::from_rows(&[vec![1, 0, 0]]).unwrap()).is_err());
    }
}
