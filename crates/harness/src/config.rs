//! TOML config loading for the harness CLI.
//!
//! Deserializes `configs/train.toml`, which has `[training]`, `[model]` and
//! `[control]` sections, then merges with CLI overrides.
//! Priority chain: built-in defaults < TOML values < CLI flags.

use std::path::Path;

use lrbm::{ControlConfig, LrbmConfig, TrainingConfig};
use serde::Deserialize;

/// Top-level structure matching `configs/train.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainToml {
    /// Orchestrator and protocol parameters.
    #[serde(default)]
    pub training: TrainingConfig,
    /// LRBM hyper-parameters. `n` and `vocab_size` come from the data.
    #[serde(default)]
    pub model: ModelOverrides,
    /// How the control set is built.
    #[serde(default)]
    pub control: ControlConfig,
}

/// Optional overrides for `LrbmConfig` fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverrides {
    pub d: Option<usize>,
    pub n_hid: Option<usize>,
    pub k_negatives: Option<usize>,
    pub seed: Option<u64>,
}

/// Values given on the `train` command line. `None` / `false` leaves the TOML value.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub epochs: Option<usize>,
    pub alpha: Option<f64>,
    pub eps: Option<f64>,
    pub minibatch_size: Option<usize>,
    pub n_hid: Option<usize>,
    pub d: Option<usize>,
    pub shuffle_control: bool,
    pub all_columns: bool,
}

/// Load and deserialize a `TrainToml` from a TOML file.
pub fn load_train_toml(path: &Path) -> anyhow::Result<TrainToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    let config: TrainToml = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded training config");
    Ok(config)
}

/// Apply CLI overrides to the TOML training section.
pub fn build_training_config(toml: &TrainingConfig, cli: &CliOverrides) -> TrainingConfig {
    let mut config = toml.clone();
    if let Some(epochs) = cli.epochs {
        config.epochs = epochs;
    }
    if let Some(alpha) = cli.alpha {
        config.alpha = alpha;
    }
    if let Some(eps) = cli.eps {
        config.learning_rate = eps;
    }
    if let Some(size) = cli.minibatch_size {
        config.minibatch_size = size;
    }
    config
}

/// Build the model config for order-`n` data over `vocab_size` terms.
pub fn build_lrbm_config(
    n: usize,
    vocab_size: usize,
    overrides: &ModelOverrides,
    cli: &CliOverrides,
) -> LrbmConfig {
    let mut config = LrbmConfig::new(n, vocab_size);
    if let Some(d) = cli.d.or(overrides.d) {
        config = config.with_d(d);
    }
    if let Some(n_hid) = cli.n_hid.or(overrides.n_hid) {
        config = config.with_n_hid(n_hid);
    }
    if let Some(k) = overrides.k_negatives {
        config = config.with_k_negatives(k);
    }
    if let Some(seed) = overrides.seed {
        config = config.with_seed(seed);
    }
    config
}

/// CLI switches can turn control options on but not off.
pub fn build_control_config(toml: &ControlConfig, cli: &CliOverrides) -> ControlConfig {
    ControlConfig {
        all_columns: toml.all_columns || cli.all_columns,
        shuffle: toml.shuffle || cli.shuffle_control,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_train_toml() {
        let toml_str = r#"
[training]
epochs = 5
minibatch_size = 500
learning_rate = 0.01
alpha = 0.9
validation = 0.1
test = 0.1
split_seed = 7
log_lik_size = 50
decimation = 5

[model]
d = 32
n_hid = 128
k_negatives = 4
seed = 99

[control]
all_columns = true
shuffle = true
"#;
        let config: TrainToml = toml::from_str(toml_str).unwrap();
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.minibatch_size, 500);
        assert_eq!(config.training.split_seed, Some(7));
        assert_eq!(config.training.decimation, 5);
        assert_eq!(config.model.d, Some(32));
        assert_eq!(config.model.seed, Some(99));
        assert!(config.control.all_columns);
        assert!(config.control.shuffle);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: TrainToml = toml::from_str("[training]\nepochs = 2\n").unwrap();
        assert_eq!(config.training.epochs, 2);
        assert_eq!(config.training.minibatch_size, 2000);
        assert!(config.model.d.is_none());
        assert_eq!(config.control, ControlConfig::default());

        let empty: TrainToml = toml::from_str("").unwrap();
        assert_eq!(empty.training, TrainingConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<TrainToml>("[model]\nhidden = 3\n").is_err());
        assert!(toml::from_str::<TrainToml>("[search]\nmax_nodes = 3\n").is_err());
    }

    #[test]
    fn test_cli_override_priority() {
        let toml: TrainToml = toml::from_str("[training]\nepochs = 5\nalpha = 0.9\n[model]\nd = 32\nn_hid = 64\n").unwrap();
        let cli = CliOverrides {
            epochs: Some(1),
            eps: Some(0.1),
            n_hid: Some(16),
            ..CliOverrides::default()
        };

        let training = build_training_config(&toml.training, &cli);
        assert_eq!(training.epochs, 1);
        assert!((training.alpha - 0.9).abs() < 1e-12);
        assert!((training.learning_rate - 0.1).abs() < 1e-12);

        let model = build_lrbm_config(4, 100, &toml.model, &cli);
        assert_eq!((model.n, model.vocab_size), (4, 100));
        assert_eq!(model.d, 32);
        assert_eq!(model.n_hid, 16);
        assert_eq!(model.k_negatives, 8);
    }

    #[test]
    fn test_control_switches() {
        let toml = ControlConfig { all_columns: true, shuffle: false };
        let cli = CliOverrides { shuffle_control: true, ..CliOverrides::default() };
        let control = build_control_config(&toml, &cli);
        assert!(control.all_columns && control.shuffle);
    }
}
