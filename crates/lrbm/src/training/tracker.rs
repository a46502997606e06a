//! Held-out likelihood tracking during training.
//!
//! Every `decimation`-th minibatch of an epoch (`mnb % decimation == decimation - 1`)
//! the tracker appends two aligned entries to the trace:
//!
//! - `log_lik`: mean `ln p` of the first `log_lik_size` validation rows, using
//!   the model's normalized probability. Exact normalization is expensive, so
//!   only a bounded prefix is scored.
//! - `log_lik_ratio`: mean of `ln u(valid) - ln u(control)` over the full
//!   validation and control sets, using the un-normalized score. The
//!   normalizer cancels in the difference, so this is cheap but approximate.

use corpus::NgramMatrix;

use crate::model::EnergyModel;
use crate::training::trace::TrainingTrace;
use crate::training::trainer::TrainingCallback;

/// Minibatch callback computing the held-out log-likelihood and the
/// validation/control log-ratio.
#[derive(Debug, Clone)]
pub struct LikelihoodTracker {
    valid_prefix: NgramMatrix,
    valid: NgramMatrix,
    control: NgramMatrix,
    decimation: usize,
}

impl LikelihoodTracker {
    /// `control` must be the control set built from `valid` (same shape).
    pub fn new(
        valid: NgramMatrix,
        control: NgramMatrix,
        log_lik_size: usize,
        decimation: usize,
    ) -> anyhow::Result<Self> {
        if decimation == 0 {
            anyhow::bail!("decimation must be > 0");
        }
        if log_lik_size == 0 {
            anyhow::bail!("log_lik_size must be > 0");
        }
        if control.shape() != valid.shape() {
            anyhow::bail!(
                "control set shape {:?} does not match validation set shape {:?}",
                control.shape(),
                valid.shape()
            );
        }
        if valid.is_empty() {
            tracing::warn!("Validation set is empty; likelihood tracking is disabled");
        }
        Ok(Self {
            valid_prefix: valid.take_prefix(log_lik_size),
            valid,
            control,
            decimation,
        })
    }

    /// Whether the tracker evaluates on minibatch `mnb` (0-indexed within the epoch).
    pub fn fires_on(&self, mnb: usize) -> bool {
        mnb % self.decimation == self.decimation - 1
    }

    /// Mean `ln p` over the validation prefix.
    pub fn held_out_log_likelihood(&self, model: &dyn EnergyModel) -> anyhow::Result<f64> {
        let log_probs = model.log_score_probability(&self.valid_prefix)?;
        check_len(log_probs.len(), self.valid_prefix.len())?;
        Ok(mean(log_probs.into_iter()))
    }

    /// Mean `ln u(valid) - ln u(control)` over the full sets, in the log domain.
    pub fn log_likelihood_ratio(&self, model: &dyn EnergyModel) -> anyhow::Result<f64> {
        let valid = model.log_score_unnormalized(&self.valid)?;
        let control = model.log_score_unnormalized(&self.control)?;
        check_len(valid.len(), self.valid.len())?;
        check_len(control.len(), self.control.len())?;
        Ok(mean(valid.iter().zip(&control).map(|(v, c)| v - c)))
    }
}

impl TrainingCallback for LikelihoodTracker {
    fn name(&self) -> &str {
        "likelihood_tracker"
    }

    fn on_minibatch(
        &mut self,
        model: &dyn EnergyModel,
        trace: &mut TrainingTrace,
        epoch: usize,
        mnb: usize,
    ) -> anyhow::Result<()> {
        if !self.fires_on(mnb) || self.valid.is_empty() {
            return Ok(());
        }
        let log_lik = self.held_out_log_likelihood(model)?;
        let ratio = self.log_likelihood_ratio(model)?;
        trace.push_log_lik(epoch, mnb, log_lik);
        trace.push_log_lik_ratio(epoch, mnb, ratio);
        tracing::info!(epoch, mnb, log_lik, log_lik_ratio = ratio, "Held-out likelihood");
        Ok(())
    }
}

fn check_len(got: usize, expected: usize) -> anyhow::Result<()> {
    if got != expected {
        anyhow::bail!("model returned {got} scores for {expected} rows");
    }
    Ok(())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count as f64
}
