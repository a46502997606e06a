//! The training trace: every scalar series a run reports.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A value recorded at a specific minibatch of a specific epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinibatchPoint {
    pub epoch: usize,
    pub mnb: usize,
    pub value: f64,
}

/// A value recorded at an epoch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochPoint {
    pub epoch: usize,
    pub value: f64,
}

/// Accumulated metrics of one training run.
///
/// Created empty before training, appended to by the orchestrator and its
/// callbacks, consumed afterwards for reporting. Survives a failed run with
/// whatever had been recorded up to the failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingTrace {
    train_cost: Vec<f64>,
    valid_cost: Vec<f64>,
    log_lik: Vec<MinibatchPoint>,
    log_lik_ratio: Vec<MinibatchPoint>,
    sentence_completion: Vec<EpochPoint>,
}

impl TrainingTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_train_cost(&mut self, cost: f64) {
        self.train_cost.push(cost);
    }

    pub fn push_valid_cost(&mut self, cost: f64) {
        self.valid_cost.push(cost);
    }

    /// Record a held-out mean log-likelihood.
    pub fn push_log_lik(&mut self, epoch: usize, mnb: usize, value: f64) {
        self.log_lik.push(MinibatchPoint { epoch, mnb, value });
    }

    /// Record a mean log-ratio between validation and control scores.
    pub fn push_log_lik_ratio(&mut self, epoch: usize, mnb: usize, value: f64) {
        self.log_lik_ratio.push(MinibatchPoint { epoch, mnb, value });
    }

    /// Record a sentence-completion accuracy. `epoch` counts completed epochs.
    pub fn push_sentence_completion(&mut self, epoch: usize, accuracy: f64) {
        self.sentence_completion.push(EpochPoint { epoch, value: accuracy });
    }

    /// Mean training cost per epoch.
    pub fn train_cost(&self) -> &[f64] {
        &self.train_cost
    }

    /// Validation cost per epoch.
    pub fn valid_cost(&self) -> &[f64] {
        &self.valid_cost
    }

    pub fn log_lik(&self) -> &[MinibatchPoint] {
        &self.log_lik
    }

    pub fn log_lik_ratio(&self) -> &[MinibatchPoint] {
        &self.log_lik_ratio
    }

    pub fn sentence_completion(&self) -> &[EpochPoint] {
        &self.sentence_completion
    }

    /// Best sentence-completion accuracy and the epoch it was reached at.
    /// Earliest epoch wins ties.
    pub fn best_sentence_completion(&self) -> Option<EpochPoint> {
        self.sentence_completion
            .iter()
            .copied()
            .fold(None, |best: Option<EpochPoint>, p| match best {
                Some(b) if b.value >= p.value => Some(b),
                _ => Some(p),
            })
    }

    /// Load a trace from a JSON file.
    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
        let trace = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))?;
        Ok(trace)
    }

    /// Write the trace as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        tracing::info!(path = %path.display(), "Saved training trace");
        Ok(())
    }
}
