//! The model collaborator interface the evaluation protocol is written against.

use corpus::NgramMatrix;

/// A trainable energy-based n-gram model.
///
/// Object safe, so callbacks can receive `&dyn EnergyModel` regardless of the
/// concrete backend. Any error returned here is fatal to a training run.
pub trait EnergyModel {
    /// Normalized probability of each row's conditioned term given its context.
    fn score_probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>>;

    /// Un-normalized, strictly positive score per row (`exp(-free_energy)`).
    ///
    /// Proportional to probability only up to a row-independent constant in
    /// aggregate; not normalized row-wise. May overflow for large models;
    /// metrics read [`EnergyModel::log_score_unnormalized`] instead.
    fn score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>>;

    /// `ln` of [`EnergyModel::score_probability`].
    fn log_score_probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        Ok(self.score_probability(batch)?.into_iter().map(f64::ln).collect())
    }

    /// `ln` of [`EnergyModel::score_unnormalized`] (`-free_energy`).
    ///
    /// Energy models override this to stay in the log domain.
    fn log_score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        Ok(self.score_unnormalized(batch)?.into_iter().map(f64::ln).collect())
    }

    /// One optimization step on `batch`. Returns the step's cost.
    ///
    /// `alpha` is the momentum coefficient.
    fn train_step(&mut self, batch: &NgramMatrix, learning_rate: f64, alpha: f64) -> anyhow::Result<f64>;

    /// The training objective on `batch` without updating parameters.
    fn cost(&self, batch: &NgramMatrix) -> anyhow::Result<f64>;

    /// Named parameter arrays, flattened. Observability only.
    fn parameters(&self) -> Vec<(String, Vec<f32>)>;
}
