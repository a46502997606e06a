//! Mock model for exercising the protocol without a neural network.

use std::cell::Cell;

use corpus::NgramMatrix;

use crate::model::EnergyModel;

type RowScore = Box<dyn Fn(&[u32]) -> f64>;

/// An `EnergyModel` with canned per-row scores and optional failure injection.
///
/// Counts calls so tests can assert on evaluation cadence.
pub struct MockModel {
    unnormalized: RowScore,
    /// When set, the log-domain score; `score_unnormalized` exponentiates it.
    log_unnormalized: Option<RowScore>,
    probability: RowScore,
    step_cost: f64,
    fail_on_step: Option<usize>,
    fail_on_scoring: bool,
    steps: usize,
    probability_calls: Cell<usize>,
    unnormalized_calls: Cell<usize>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModel {
    /// Every row scores 1.0 un-normalized and 0.5 normalized; every step costs 1.0.
    pub fn new() -> Self {
        Self {
            unnormalized: Box::new(|_| 1.0),
            log_unnormalized: None,
            probability: Box::new(|_| 0.5),
            step_cost: 1.0,
            fail_on_step: None,
            fail_on_scoring: false,
            steps: 0,
            probability_calls: Cell::new(0),
            unnormalized_calls: Cell::new(0),
        }
    }

    /// Use `f(row)` as the un-normalized score.
    pub fn with_unnormalized(mut self, f: impl Fn(&[u32]) -> f64 + 'static) -> Self {
        self.unnormalized = Box::new(f);
        self
    }

    /// Use `f(row)` as the log un-normalized score, for magnitudes that
    /// overflow `exp`.
    pub fn with_log_unnormalized(mut self, f: impl Fn(&[u32]) -> f64 + 'static) -> Self {
        self.log_unnormalized = Some(Box::new(f));
        self
    }

    /// Use `f(row)` as the normalized probability.
    pub fn with_probability(mut self, f: impl Fn(&[u32]) -> f64 + 'static) -> Self {
        self.probability = Box::new(f);
        self
    }

    /// Cost returned by every `train_step`.
    pub fn with_step_cost(mut self, cost: f64) -> Self {
        self.step_cost = cost;
        self
    }

    /// Make the `k`-th `train_step` call (0-indexed) fail.
    pub fn failing_on_step(mut self, k: usize) -> Self {
        self.fail_on_step = Some(k);
        self
    }

    /// Make every scoring call fail.
    pub fn failing_on_scoring(mut self) -> Self {
        self.fail_on_scoring = true;
        self
    }

    /// Number of successful `train_step` calls so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn probability_calls(&self) -> usize {
        self.probability_calls.get()
    }

    pub fn unnormalized_calls(&self) -> usize {
        self.unnormalized_calls.get()
    }
}

impl EnergyModel for MockModel {
    fn score_probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        if self.fail_on_scoring {
            anyhow::bail!("mock scoring failure");
        }
        self.probability_calls.set(self.probability_calls.get() + 1);
        Ok(batch.rows().map(|r| (self.probability)(r)).collect())
    }

    fn score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        if self.fail_on_scoring {
            anyhow::bail!("mock scoring failure");
        }
        self.unnormalized_calls.set(self.unnormalized_calls.get() + 1);
        match &self.log_unnormalized {
            Some(log) => Ok(batch.rows().map(|r| log(r).exp()).collect()),
            None => Ok(batch.rows().map(|r| (self.unnormalized)(r)).collect()),
        }
    }

    fn log_score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        let Some(log) = &self.log_unnormalized else {
            return Ok(self.score_unnormalized(batch)?.into_iter().map(f64::ln).collect());
        };
        if self.fail_on_scoring {
            anyhow::bail!("mock scoring failure");
        }
        self.unnormalized_calls.set(self.unnormalized_calls.get() + 1);
        Ok(batch.rows().map(|r| log(r)).collect())
    }

    fn train_step(&mut self, _batch: &NgramMatrix, _learning_rate: f64, _alpha: f64) -> anyhow::Result<f64> {
        if self.fail_on_step == Some(self.steps) {
            anyhow::bail!("mock train_step failure at step {}", self.steps);
        }
        self.steps += 1;
        Ok(self.step_cost)
    }

    fn cost(&self, _batch: &NgramMatrix) -> anyhow::Result<f64> {
        Ok(self.step_cost)
    }

    fn parameters(&self) -> Vec<(String, Vec<f32>)> {
        vec![("w".to_string(), vec![1.0, 2.0, 3.0])]
    }
}
