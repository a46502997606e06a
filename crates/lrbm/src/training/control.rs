//! Control ("wrong-context") sets for likelihood-ratio diagnostics.
//!
//! A control set is a copy of an n-gram matrix whose conditioned term (or every
//! term) has been decoupled from the rest of the row, either by resampling from
//! a distribution over the vocabulary or by permuting the column across rows.
//! Comparing a model's scores on the true rows against the control rows shows
//! how much of its probability mass comes from context rather than from the
//! unigram prior.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use corpus::NgramMatrix;

use crate::error::HarnessError;

/// Tolerance on `Σ p = 1` for [`DistributionVector::new`].
const SUM_TOLERANCE: f64 = 1e-6;

/// A probability vector over the vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionVector {
    probs: Vec<f64>,
}

impl DistributionVector {
    /// Wrap an already-normalized probability vector.
    ///
    /// # Errors
    /// Fails if the vector is empty, has a negative or non-finite entry, or
    /// does not sum to 1.
    pub fn new(probs: Vec<f64>) -> Result<Self, HarnessError> {
        check_weights(&probs)?;
        let sum: f64 = probs.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(HarnessError::InvalidDistribution(format!(
                "probabilities sum to {sum}, expected 1"
            )));
        }
        Ok(Self { probs })
    }

    /// Normalize non-negative weights into a probability vector.
    pub fn from_weights(weights: Vec<f64>) -> Result<Self, HarnessError> {
        check_weights(&weights)?;
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(HarnessError::InvalidDistribution(
                "weights sum to zero".to_string(),
            ));
        }
        Ok(Self {
            probs: weights.into_iter().map(|w| w / sum).collect(),
        })
    }

    /// The uniform distribution over `vocab_size` terms.
    pub fn uniform(vocab_size: usize) -> Result<Self, HarnessError> {
        Self::from_weights(vec![1.0; vocab_size])
    }

    /// Number of terms the distribution covers.
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    /// Whether the distribution covers no terms.
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Probabilities, indexed by vocabulary term.
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }
}

fn check_weights(weights: &[f64]) -> Result<(), HarnessError> {
    if weights.is_empty() {
        return Err(HarnessError::InvalidDistribution("empty vector".to_string()));
    }
    if let Some((i, w)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(HarnessError::InvalidDistribution(format!(
            "entry {i} is {w}"
        )));
    }
    Ok(())
}

/// Which columns of the control set get perturbed, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
pub struct ControlConfig {
    /// Perturb every column independently instead of only the conditioned one.
    #[serde(default)]
    pub all_columns: bool,
    /// Permute existing values across rows instead of resampling.
    #[serde(default)]
    pub shuffle: bool,
}

/// Produce a control copy of `matrix`.
///
/// - `all_columns = false` touches only column 0 (the conditioned term);
///   `true` perturbs every column, each independently of the others.
/// - `shuffle = true` permutes each targeted column across rows, preserving
///   its histogram exactly; `distribution` is ignored.
/// - `shuffle = false` draws `N` fresh i.i.d. samples per targeted column from
///   `distribution`, or uniformly over `[0, vocab_size)` if it is `None`.
///
/// The input is never mutated and the output has the same shape.
pub fn perturb(
    matrix: &NgramMatrix,
    vocab_size: usize,
    all_columns: bool,
    distribution: Option<&DistributionVector>,
    shuffle: bool,
    rng: &mut impl Rng,
) -> Result<NgramMatrix, HarnessError> {
    let mut control = matrix.clone();
    let rows = matrix.len();
    let targets = if all_columns { matrix.n() } else { 1 };

    let sampler = match (shuffle, distribution) {
        (false, Some(dist)) => {
            if dist.len() != vocab_size {
                return Err(HarnessError::InvalidDistribution(format!(
                    "distribution covers {} terms, vocabulary has {vocab_size}",
                    dist.len()
                )));
            }
            Some(
                WeightedIndex::new(dist.probs())
                    .map_err(|e| HarnessError::InvalidDistribution(e.to_string()))?,
            )
        }
        (false, None) if vocab_size == 0 => {
            return Err(HarnessError::InvalidDistribution(
                "cannot sample uniformly from an empty vocabulary".to_string(),
            ))
        }
        _ => None,
    };

    for term in 0..targets {
        let values: Vec<u32> = if shuffle {
            let mut col = matrix.column(term);
            col.shuffle(rng);
            col
        } else {
            match &sampler {
                Some(weighted) => (0..rows).map(|_| weighted.sample(rng) as u32).collect(),
                None => (0..rows)
                    .map(|_| rng.gen_range(0..vocab_size as u32))
                    .collect(),
            }
        };
        control.set_column(term, &values);
    }

    tracing::debug!(
        rows,
        columns = targets,
        shuffle,
        weighted = distribution.is_some() && !shuffle,
        "Generated control set"
    );
    Ok(control)
}
