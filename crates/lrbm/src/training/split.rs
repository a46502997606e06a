//! Dataset partitioning into train / validation / test subsets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use corpus::NgramMatrix;

use crate::error::HarnessError;

/// Absorbs floating-point noise in `N * fraction` so that e.g.
/// `1000 * (1 - 0.1)` cuts at 900 rather than 899.
const BOUNDARY_EPS: f64 = 1e-9;

/// Where a split (or a control set) gets its randomness from.
///
/// Construct once and thread the resulting RNG through every call that should
/// share one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomSource {
    /// Reproducible stream from an explicit seed.
    Seeded(u64),
    /// Fresh OS entropy. Results are NOT reproducible across runs.
    Entropy,
}

impl RandomSource {
    /// `Seeded(seed)` if a seed is given, `Entropy` otherwise.
    pub fn from_option(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::Seeded(s),
            None => Self::Entropy,
        }
    }

    /// Build the RNG for this source.
    pub fn rng(self) -> StdRng {
        match self {
            Self::Seeded(seed) => StdRng::seed_from_u64(seed),
            Self::Entropy => StdRng::from_entropy(),
        }
    }
}

/// The three disjoint row subsets produced by [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: NgramMatrix,
    pub valid: NgramMatrix,
    pub test: NgramMatrix,
}

/// Cut indices `(i1, i2)` for `n` rows: train is `[0, i1)`, validation
/// `[i1, i2)`, test `[i2, n)`.
pub fn split_indices(
    n: usize,
    validation: f64,
    test: f64,
) -> Result<(usize, usize), HarnessError> {
    if !(validation > 0.0 && test > 0.0 && validation + test < 1.0) {
        return Err(HarnessError::InvalidSplitFraction { validation, test });
    }
    let cut = |frac: f64| ((n as f64 * frac + BOUNDARY_EPS).floor() as usize).min(n);
    let i1 = cut(1.0 - (validation + test));
    let i2 = cut(1.0 - test).max(i1);
    Ok((i1, i2))
}

/// Shuffle the rows of `matrix` with `rng` and split them into train,
/// validation and test subsets of sizes `≈ N·(1-validation-test)`,
/// `≈ N·validation` and `≈ N·test` (floor semantics on the cut points).
///
/// The input is not mutated; the shuffle happens on a copy.
pub fn split(
    matrix: &NgramMatrix,
    validation: f64,
    test: f64,
    rng: &mut impl Rng,
) -> Result<Split, HarnessError> {
    let (i1, i2) = split_indices(matrix.len(), validation, test)?;

    tracing::info!(
        validation,
        test,
        rows = matrix.len(),
        "Performing dataset split"
    );

    let mut shuffled = matrix.clone();
    shuffled.shuffle_rows(rng);

    let n = shuffled.len();
    let split = Split {
        train: shuffled.slice_rows(0, i1),
        valid: shuffled.slice_rows(i1, i2),
        test: shuffled.slice_rows(i2, n),
    };
    if split.valid.is_empty() || split.test.is_empty() {
        tracing::warn!(
            train = split.train.len(),
            valid = split.valid.len(),
            test = split.test.len(),
            "Split produced an empty subset; fractions are too small for this corpus"
        );
    }
    Ok(split)
}

/// [`split`] with a freshly constructed RNG from `source`.
///
/// With [`RandomSource::Entropy`] the split is not reproducible.
pub fn split_with_source(
    matrix: &NgramMatrix,
    validation: f64,
    test: f64,
    source: RandomSource,
) -> Result<Split, HarnessError> {
    split(matrix, validation, test, &mut source.rng())
}
