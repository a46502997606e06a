//! The trainable LRBM: network, optimizer and sampling state behind the
//! [`EnergyModel`] interface.

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, Sgd, SgdConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use corpus::NgramMatrix;

use crate::model::bridge::{tensor_to_vec, NgramBatch};
use crate::model::lrbm::{LrbmConfig, LrbmNet};
use crate::model::EnergyModel;
use crate::training::loss::{contrastive_loss, corrupt_conditioned};

/// Upper bound on rows per forward pass when enumerating the vocabulary.
const ENUMERATION_ROWS: usize = 16_384;
/// Upper bound on rows per forward pass when scoring.
const SCORING_ROWS: usize = 4_096;

type MomentumSgd<B> = OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, LrbmNet<B>, B>;

/// Log-bilinear RBM over n-grams, trained with momentum SGD on a contrastive
/// objective.
///
/// Scores are exact: `score_probability` normalizes the conditioned term over
/// the whole vocabulary.
pub struct Lrbm<B: AutodiffBackend> {
    config: LrbmConfig,
    net: LrbmNet<B>,
    /// Built on the first step and rebuilt whenever `alpha` changes.
    optimizer: Option<(f64, MomentumSgd<B>)>,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> Lrbm<B> {
    pub fn new(config: LrbmConfig, device: B::Device) -> anyhow::Result<Self> {
        if config.n == 0 || config.vocab_size == 0 {
            anyhow::bail!("LRBM needs n > 0 and vocab_size > 0");
        }
        if config.k_negatives == 0 {
            anyhow::bail!("LRBM needs at least one negative sample per row");
        }
        B::seed(config.seed);
        let net = config.init::<B>(&device);
        tracing::info!(
            n = config.n,
            vocab_size = config.vocab_size,
            d = config.d,
            n_hid = config.n_hid,
            k_negatives = config.k_negatives,
            "Initialized LRBM"
        );
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            net,
            optimizer: None,
            device,
        })
    }

    pub fn config(&self) -> &LrbmConfig {
        &self.config
    }

    fn check_batch(&self, batch: &NgramMatrix) -> anyhow::Result<()> {
        if batch.n() != self.config.n {
            anyhow::bail!(
                "batch has n-gram order {}, model expects {}",
                batch.n(),
                self.config.n
            );
        }
        batch.validate(self.config.vocab_size)
    }

    /// Free energies of every row, in chunks, on the inference (non-autodiff) network.
    fn free_energies(
        &self,
        net: &LrbmNet<B::InnerBackend>,
        batch: &NgramMatrix,
        chunk_rows: usize,
    ) -> Vec<f64> {
        let mut out = Vec::with_capacity(batch.len());
        let mut start = 0;
        while start < batch.len() {
            let end = (start + chunk_rows).min(batch.len());
            let chunk = NgramBatch::from_matrix(&batch.slice_rows(start, end), self.config.vocab_size, &self.device);
            out.extend(tensor_to_vec(net.free_energy(&chunk)));
            start = end;
        }
        out
    }

    /// `ln p(x_0 | x_1..x_{n-1})` for every row, normalizing over the vocabulary.
    pub fn log_probabilities(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        self.check_batch(batch)?;
        let net = self.net.valid();
        let vocab = self.config.vocab_size;
        let rows_per_pass = (ENUMERATION_ROWS / vocab).max(1);

        let mut out = Vec::with_capacity(batch.len());
        let mut start = 0;
        while start < batch.len() {
            let end = (start + rows_per_pass).min(batch.len());
            let chunk = batch.slice_rows(start, end);

            // Row r, candidate v sits at r * vocab + v.
            let mut expanded = chunk.repeat_rows(vocab);
            let candidates: Vec<u32> = (0..chunk.len()).flat_map(|_| 0..vocab as u32).collect();
            expanded.set_column(0, &candidates);
            let energies = self.free_energies(&net, &expanded, expanded.len());

            for (r, row) in chunk.rows().enumerate() {
                let logits: Vec<f64> = energies[r * vocab..(r + 1) * vocab].iter().map(|f| -f).collect();
                out.push(logits[row[0] as usize] - log_sum_exp(&logits));
            }
            start = end;
        }
        Ok(out)
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn momentum_sgd<B: AutodiffBackend>(alpha: f64) -> MomentumSgd<B> {
    SgdConfig::new()
        .with_momentum(Some(
            MomentumConfig::new().with_momentum(alpha).with_dampening(0.0),
        ))
        .init()
}

impl<B: AutodiffBackend> EnergyModel for Lrbm<B> {
    fn score_probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        Ok(self.log_probabilities(batch)?.into_iter().map(f64::exp).collect())
    }

    /// `exp(-F)`. Overflows to `inf` once `-F > 709`, which wide hidden
    /// layers reach at initialization.
    fn score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        Ok(self.log_score_unnormalized(batch)?.into_iter().map(f64::exp).collect())
    }

    fn log_score_probability(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        self.log_probabilities(batch)
    }

    fn log_score_unnormalized(&self, batch: &NgramMatrix) -> anyhow::Result<Vec<f64>> {
        self.check_batch(batch)?;
        let net = self.net.valid();
        Ok(self
            .free_energies(&net, batch, SCORING_ROWS)
            .into_iter()
            .map(|f| -f)
            .collect())
    }

    fn train_step(&mut self, batch: &NgramMatrix, learning_rate: f64, alpha: f64) -> anyhow::Result<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        self.check_batch(batch)?;

        let negatives = corrupt_conditioned(batch, self.config.vocab_size, self.config.k_negatives, &mut self.rng);
        let loss = contrastive_loss(&self.net, batch, &negatives, self.config.vocab_size, &self.device);
        let value: f64 = loss.clone().into_scalar().elem();
        if !value.is_finite() {
            anyhow::bail!("non-finite training loss {value}");
        }
        let grads = GradientsParams::from_grads(loss.backward(), &self.net);

        if self.optimizer.as_ref().map(|(a, _)| *a) != Some(alpha) {
            tracing::debug!(alpha, "Building momentum SGD optimizer");
            self.optimizer = Some((alpha, momentum_sgd::<B>(alpha)));
        }
        if let Some((_, optimizer)) = self.optimizer.as_mut() {
            self.net = optimizer.step(learning_rate, self.net.clone(), grads);
        }
        Ok(value)
    }

    /// Contrastive loss against a fixed set of negatives, so values are
    /// comparable across calls. Zero for an empty batch.
    fn cost(&self, batch: &NgramMatrix) -> anyhow::Result<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        self.check_batch(batch)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let negatives = corrupt_conditioned(batch, self.config.vocab_size, self.config.k_negatives, &mut rng);
        let net = self.net.valid();

        let mut total = 0.0;
        let mut start = 0;
        while start < batch.len() {
            let end = (start + SCORING_ROWS).min(batch.len());
            let k = self.config.k_negatives;
            let loss = contrastive_loss(
                &net,
                &batch.slice_rows(start, end),
                &negatives.slice_rows(start * k, end * k),
                self.config.vocab_size,
                &self.device,
            );
            let chunk_mean: f64 = loss.into_scalar().elem();
            total += chunk_mean * (end - start) as f64;
            start = end;
        }
        Ok(total / batch.len() as f64)
    }

    fn parameters(&self) -> Vec<(String, Vec<f32>)> {
        self.net.named_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;

    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn small_model(n: usize, vocab: usize) -> Lrbm<TestAutodiffBackend> {
        let config = LrbmConfig::new(n, vocab).with_d(4).with_n_hid(8).with_k_negatives(4).with_seed(7);
        Lrbm::new(config, Default::default()).unwrap()
    }

    #[test]
    fn test_log_sum_exp() {
        let v = [1.0, 2.0, 3.0];
        let expected = (1.0_f64.exp() + 2.0_f64.exp() + 3.0_f64.exp()).ln();
        assert!((log_sum_exp(&v) - expected).abs() < 1e-12);
        assert!((log_sum_exp(&[1000.0, 1000.0]) - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_normalize_over_vocabulary() {
        let model = small_model(3, 7);
        // Every completion of one context.
        let rows: Vec<Vec<u32>> = (0..7).map(|v| vec![v, 2, 5]).collect();
        let batch = NgramMatrix::from_rows(&rows).unwrap();
        let probs = model.score_probability(&batch).unwrap();
        let total: f64 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-4, "sum = {total}");
        assert!(probs.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn test_probability_proportional_to_unnormalized() {
        let model = small_model(2, 5);
        let batch = NgramMatrix::from_rows(&[vec![0, 3], vec![4, 3]]).unwrap();
        let p = model.score_probability(&batch).unwrap();
        let u = model.score_unnormalized(&batch).unwrap();
        assert!(((p[0] / p[1]) - (u[0] / u[1])).abs() < 1e-3 * (u[0] / u[1]));
    }

    #[test]
    fn test_training_lowers_cost() {
        let mut model = small_model(2, 6);
        // Deterministic bigram: successor of w is (w + 1) mod 6.
        let rows: Vec<Vec<u32>> = (0..60).map(|i| vec![(i % 6 + 1) % 6, i % 6]).collect();
        let batch = NgramMatrix::from_rows(&rows).unwrap();

        let before = model.cost(&batch).unwrap();
        for _ in 0..60 {
            model.train_step(&batch, 0.1, 0.5).unwrap();
        }
        let after = model.cost(&batch).unwrap();
        assert!(after < before, "cost did not decrease: {before} -> {after}");
    }

    #[test]
    fn test_cost_is_deterministic() {
        let model = small_model(3, 9);
        let batch = NgramMatrix::from_rows(&[vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 0]]).unwrap();
        assert_eq!(model.cost(&batch).unwrap(), model.cost(&batch).unwrap());
    }

    #[test]
    fn test_rejects_out_of_vocabulary_and_wrong_order() {
        let mut model = small_model(2, 4);
        let oov = NgramMatrix::from_rows(&[vec![9, 0]]).unwrap();
        assert!(model.score_unnormalized(&oov).is_err());
        assert!(model.train_step(&oov, 0.01, 0.5).is_err());
        let wrong_n = NgramMatrix::from_rows(&[vec![0, 1, 2]]).unwrap();
        assert!(model.score_probability(&wrong_n).is_err());
    }

    #[test]
    fn test_empty_batches() {
        let mut model = small_model(2, 4);
        let empty = NgramMatrix::empty(2).unwrap();
        assert!(model.score_probability(&empty).unwrap().is_empty());
        assert!(model.score_unnormalized(&empty).unwrap().is_empty());
        assert_eq!(model.cost(&empty).unwrap(), 0.0);
        assert_eq!(model.train_step(&empty, 0.1, 0.5).unwrap(), 0.0);
    }

    #[test]
    fn test_parameters_change_after_step() {
        let mut model = small_model(2, 4);
        let before = model.parameters();
        let batch = NgramMatrix::from_rows(&[vec![1, 0], vec![2, 1], vec![3, 2]]).unwrap();
        model.train_step(&batch, 0.5, 0.0).unwrap();
        let after = model.parameters();
        assert_eq!(before.len(), after.len());
        assert_ne!(before, after);
    }
}
