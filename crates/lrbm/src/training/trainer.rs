//! Training orchestrator: epochs of contiguous minibatches over the training
//! set, delegating each gradient step to the model and firing minibatch and
//! epoch callbacks inline.

use std::fmt;

use serde::{Deserialize, Serialize};

use corpus::NgramMatrix;

use crate::error::HarnessError;
use crate::model::EnergyModel;
use crate::training::metrics::param_stats;
use crate::training::trace::TrainingTrace;

/// Orchestrator and protocol parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of passes over the training set.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Rows per minibatch; the last minibatch of an epoch may be shorter.
    #[serde(default = "default_minibatch_size")]
    pub minibatch_size: usize,
    /// Learning rate (`eps`).
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Momentum.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Validation fraction of the corpus.
    #[serde(default = "default_holdout")]
    pub validation: f64,
    /// Test fraction of the corpus.
    #[serde(default = "default_holdout")]
    pub test: f64,
    /// Split seed. `None` draws from OS entropy and is not reproducible.
    #[serde(default = "default_split_seed")]
    pub split_seed: Option<u64>,
    /// Validation rows scored with exact probabilities by the likelihood tracker.
    #[serde(default = "default_log_lik_size")]
    pub log_lik_size: usize,
    /// The likelihood tracker fires on every `decimation`-th minibatch.
    #[serde(default = "default_decimation")]
    pub decimation: usize,
    /// Run the epoch callbacks once before the first gradient step.
    #[serde(default = "default_eval_before_training")]
    pub eval_before_training: bool,
}

fn default_epochs() -> usize {
    20
}
fn default_minibatch_size() -> usize {
    2000
}
fn default_learning_rate() -> f64 {
    0.002
}
fn default_alpha() -> f64 {
    0.5
}
fn default_holdout() -> f64 {
    0.05
}
fn default_split_seed() -> Option<u64> {
    Some(12345)
}
fn default_log_lik_size() -> usize {
    100
}
fn default_decimation() -> usize {
    10
}
fn default_eval_before_training() -> bool {
    true
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            minibatch_size: default_minibatch_size(),
            learning_rate: default_learning_rate(),
            alpha: default_alpha(),
            validation: default_holdout(),
            test: default_holdout(),
            split_seed: default_split_seed(),
            log_lik_size: default_log_lik_size(),
            decimation: default_decimation(),
            eval_before_training: default_eval_before_training(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        let invalid = |msg: String| Err(HarnessError::InvalidConfig(msg));
        if self.minibatch_size == 0 {
            return invalid("minibatch_size must be > 0".into());
        }
        if self.decimation == 0 {
            return invalid("decimation must be > 0".into());
        }
        if self.log_lik_size == 0 {
            return invalid("log_lik_size must be > 0".into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.alpha) {
            return invalid(format!("alpha must be in [0, 1), got {}", self.alpha));
        }
        Ok(())
    }
}

/// Hooks fired by the [`Orchestrator`].
///
/// Callbacks see the model read-only and append to the caller-owned trace.
/// An error is fatal to the run.
pub trait TrainingCallback {
    fn name(&self) -> &str;

    /// After the gradient step of minibatch `mnb` (0-indexed) of epoch `epoch` (0-indexed).
    fn on_minibatch(
        &mut self,
        _model: &dyn EnergyModel,
        _trace: &mut TrainingTrace,
        _epoch: usize,
        _mnb: usize,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// At an epoch boundary. `epoch` counts completed epochs: 0 before
    /// training, `k` after the k-th epoch.
    fn on_epoch(&mut self, _model: &dyn EnergyModel, _trace: &mut TrainingTrace, _epoch: usize) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Training { epoch: usize, minibatch: usize },
    Completed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Training { epoch, minibatch } => write!(f, "training (epoch {epoch}, minibatch {minibatch})"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Per-epoch cost trajectories returned by [`Orchestrator::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTrajectories {
    pub train_cost: Vec<f64>,
    pub valid_cost: Vec<f64>,
}

/// Drives one training run. Single use: a second `run` fails with
/// [`HarnessError::AlreadyStarted`].
#[derive(Debug)]
pub struct Orchestrator {
    config: TrainingConfig,
    state: TrainingState,
}

impl Orchestrator {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            state: TrainingState::Idle,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Current state. After a failed run this is the state the failure happened in.
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Number of minibatches per epoch for `rows` training rows.
    pub fn minibatches_per_epoch(&self, rows: usize) -> usize {
        rows.div_ceil(self.config.minibatch_size.max(1))
    }

    /// Train `model` for the configured number of epochs.
    ///
    /// Model and callback failures abort the run and are returned unmodified;
    /// whatever had been appended to `trace` stays there.
    pub fn run(
        &mut self,
        model: &mut dyn EnergyModel,
        train: &NgramMatrix,
        valid: &NgramMatrix,
        callbacks: &mut [&mut dyn TrainingCallback],
        trace: &mut TrainingTrace,
    ) -> Result<CostTrajectories, HarnessError> {
        if self.state != TrainingState::Idle {
            return Err(HarnessError::AlreadyStarted(self.state.to_string()));
        }
        self.config.validate()?;

        let n_batches = self.minibatches_per_epoch(train.len());
        let mnb_size = self.config.minibatch_size;
        tracing::info!(
            epochs = self.config.epochs,
            train_rows = train.len(),
            valid_rows = valid.len(),
            minibatches = n_batches,
            callbacks = ?callbacks.iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
            "Starting training"
        );
        if n_batches == 0 {
            tracing::warn!("Training set is empty; epochs will not update the model");
        }

        self.state = TrainingState::Training { epoch: 0, minibatch: 0 };
        if self.config.eval_before_training {
            fire_epoch(callbacks, &*model, trace, 0)?;
        }

        let mut costs = CostTrajectories::default();
        for epoch in 0..self.config.epochs {
            let mut batch_costs = Vec::with_capacity(n_batches);
            for mnb in 0..n_batches {
                self.state = TrainingState::Training { epoch, minibatch: mnb };
                let end = ((mnb + 1) * mnb_size).min(train.len());
                let batch = train.slice_rows(mnb * mnb_size, end);

                let cost = model.train_step(&batch, self.config.learning_rate, self.config.alpha)?;
                if !cost.is_finite() {
                    tracing::warn!(epoch, mnb, cost, "Non-finite minibatch cost");
                }
                batch_costs.push(cost);

                for callback in callbacks.iter_mut() {
                    callback
                        .on_minibatch(&*model, trace, epoch, mnb)
                        .map_err(into_harness_error)?;
                }
            }

            let train_cost = if batch_costs.is_empty() {
                0.0
            } else {
                batch_costs.iter().sum::<f64>() / batch_costs.len() as f64
            };
            let valid_cost = model.cost(valid)?;
            trace.push_train_cost(train_cost);
            trace.push_valid_cost(valid_cost);
            costs.train_cost.push(train_cost);
            costs.valid_cost.push(valid_cost);
            tracing::info!(epoch, train_cost, valid_cost, "Epoch complete");

            for stats in param_stats(&model.parameters()) {
                tracing::info!(epoch, param = %stats.name, mean = stats.mean, std = stats.std, "Parameter stats");
            }
            fire_epoch(callbacks, &*model, trace, epoch + 1)?;
        }

        self.state = TrainingState::Completed;
        tracing::info!(epochs = self.config.epochs, "Training complete");
        Ok(costs)
    }
}

fn fire_epoch(
    callbacks: &mut [&mut dyn TrainingCallback],
    model: &dyn EnergyModel,
    trace: &mut TrainingTrace,
    epoch: usize,
) -> Result<(), HarnessError> {
    for callback in callbacks.iter_mut() {
        callback
            .on_epoch(model, trace, epoch)
            .map_err(into_harness_error)?;
    }
    Ok(())
}

/// Recover a typed protocol error from a callback, or wrap anything else.
fn into_harness_error(err: anyhow::Error) -> HarnessError {
    match err.downcast::<HarnessError>() {
        Ok(harness) => harness,
        Err(other) => HarnessError::Model(other),
    }
}
