//! Result types written next to each training trace.

use std::path::{Path, PathBuf};

use lrbm::TrainingTrace;
use serde::{Deserialize, Serialize};

/// Final metrics of a training trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    /// Number of completed epochs.
    pub epochs: usize,
    pub final_train_cost: Option<f64>,
    pub final_valid_cost: Option<f64>,
    /// Last held-out mean log-likelihood.
    pub final_log_lik: Option<f64>,
    /// Last validation/control mean log-ratio.
    pub final_log_lik_ratio: Option<f64>,
    /// Sentence-completion accuracy after the last epoch.
    pub final_sentence_completion: Option<f64>,
    /// Best sentence-completion accuracy (earliest epoch on ties).
    pub best_sentence_completion: Option<f64>,
    /// Completed epochs at which the best accuracy was reached.
    pub best_epoch: Option<usize>,
}

impl TraceSummary {
    pub fn of(trace: &TrainingTrace) -> Self {
        let best = trace.best_sentence_completion();
        Self {
            epochs: trace.train_cost().len(),
            final_train_cost: trace.train_cost().last().copied(),
            final_valid_cost: trace.valid_cost().last().copied(),
            final_log_lik: trace.log_lik().last().map(|p| p.value),
            final_log_lik_ratio: trace.log_lik_ratio().last().map(|p| p.value),
            final_sentence_completion: trace.sentence_completion().last().map(|p| p.value),
            best_sentence_completion: best.map(|p| p.value),
            best_epoch: best.map(|p| p.epoch),
        }
    }

    /// Human-readable report, one metric per line.
    pub fn render(&self) -> String {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
        let mut out = String::new();
        out.push_str(&format!("Epochs: {}\n", self.epochs));
        out.push_str(&format!("Train cost: {}\n", fmt(self.final_train_cost)));
        out.push_str(&format!("Valid cost: {}\n", fmt(self.final_valid_cost)));
        out.push_str(&format!("Held-out log-likelihood: {}\n", fmt(self.final_log_lik)));
        out.push_str(&format!("Log-likelihood ratio: {}\n", fmt(self.final_log_lik_ratio)));
        out.push_str(&format!(
            "Sentence completion: {}\n",
            fmt(self.final_sentence_completion)
        ));
        match (self.best_sentence_completion, self.best_epoch) {
            (Some(acc), Some(epoch)) => out.push_str(&format!("Best: {acc:.4} (epoch {epoch})\n")),
            _ => out.push_str("Best: -\n"),
        }
        out
    }
}

/// Everything `summary.json` records about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub n: usize,
    pub vocab_size: usize,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub test_rows: usize,
    pub challenge_groups: usize,
    pub elapsed_secs: f64,
    #[serde(flatten)]
    pub trace: TraceSummary,
}

impl RunSummary {
    pub fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Run directory named after the hyper-parameters that distinguish runs.
pub fn run_dir(
    output_dir: &Path,
    n_hid: usize,
    d: usize,
    minibatch_size: usize,
    epochs: usize,
    eps: f64,
    alpha: f64,
) -> PathBuf {
    output_dir.join(format!(
        "nhid-{n_hid}_d-{d}_train_mnb-{minibatch_size}_epochs-{epochs}_eps-{eps:.5}_alpha-{alpha:.2}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_dir_name() {
        let dir = run_dir(Path::new("nnet_models"), 1000, 100, 2000, 20, 0.002, 0.5);
        assert_eq!(
            dir,
            PathBuf::from("nnet_models/nhid-1000_d-100_train_mnb-2000_epochs-20_eps-0.00200_alpha-0.50")
        );
    }

    #[test]
    fn test_summary_of_empty_trace() {
        let summary = TraceSummary::of(&TrainingTrace::new());
        assert_eq!(summary.epochs, 0);
        assert!(summary.final_train_cost.is_none());
        assert!(summary.best_epoch.is_none());
        assert!(summary.render().contains("Best: -"));
    }

    #[test]
    fn test_summary_picks_last_and_best() {
        let mut trace = TrainingTrace::new();
        trace.push_sentence_completion(0, 0.2);
        for (epoch, (cost, acc)) in [(2.0, 0.6), (1.5, 0.4)].into_iter().enumerate() {
            trace.push_train_cost(cost);
            trace.push_valid_cost(cost + 0.1);
            trace.push_log_lik(epoch, 9, -3.0 + epoch as f64);
            trace.push_log_lik_ratio(epoch, 9, 0.5);
            trace.push_sentence_completion(epoch + 1, acc);
        }

        let summary = TraceSummary::of(&trace);
        assert_eq!(summary.epochs, 2);
        assert_eq!(summary.final_train_cost, Some(1.5));
        assert_eq!(summary.final_log_lik, Some(-2.0));
        assert_eq!(summary.final_sentence_completion, Some(0.4));
        assert_eq!(summary.best_sentence_completion, Some(0.6));
        assert_eq!(summary.best_epoch, Some(1));
        assert!(summary.render().contains("Best: 0.6000 (epoch 1)"));
    }

    #[test]
    fn test_run_summary_serde_roundtrip() {
        let summary = RunSummary {
            n: 4,
            vocab_size: 50,
            train_rows: 900,
            valid_rows: 50,
            test_rows: 50,
            challenge_groups: 10,
            elapsed_secs: 1.25,
            trace: TraceSummary::of(&TrainingTrace::new()),
        };
        let json = serde_json::to_string_pretty(&summary).unwrap();
        assert!(json.contains("\"best_epoch\": null"));
        let loaded: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, summary);
    }
}
