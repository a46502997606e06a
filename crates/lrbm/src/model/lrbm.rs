use burn::module::Param;
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::TensorData;

use crate::model::bridge::NgramBatch;

/// Configuration for the log-bilinear RBM.
///
/// ```text
/// tokens (batch, n)
///   → shared Embedding(vocab→d) → flatten (batch, n·d)
///   → Linear(n·d→n_hid) → softplus → Σ                  (hidden term)
/// visible_bias[position, token] → Σ                      (visible term)
/// free energy F = −visible − hidden : (batch,)
/// ```
#[derive(Config, Debug)]
pub struct LrbmConfig {
    /// N-gram order.
    pub n: usize,
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Word embedding dimension.
    #[config(default = 100)]
    pub d: usize,
    /// Number of hidden units.
    #[config(default = 1000)]
    pub n_hid: usize,
    /// Negative samples per positive row in the contrastive objective.
    #[config(default = 8)]
    pub k_negatives: usize,
    /// Seed for weight initialization and negative sampling.
    #[config(default = 12345)]
    pub seed: u64,
}

/// The network: word embeddings shared across positions, one hidden layer,
/// and a per-position visible bias.
///
/// Lower free energy = more probable n-gram.
#[derive(Module, Debug)]
pub struct LrbmNet<B: Backend> {
    embedding: Embedding<B>,
    hidden: Linear<B>,
    /// Shape `(n, vocab_size)`, initialized to zero.
    visible_bias: Param<Tensor<B, 2>>,
}

impl LrbmConfig {
    /// Initialize the network on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LrbmNet<B> {
        LrbmNet {
            embedding: EmbeddingConfig::new(self.vocab_size, self.d).init(device),
            hidden: LinearConfig::new(self.n * self.d, self.n_hid).init(device),
            visible_bias: Param::from_tensor(Tensor::zeros([self.n, self.vocab_size], device)),
        }
    }
}

impl<B: Backend> LrbmNet<B> {
    /// Free energy of every row. Input `(batch, n)`, output `(batch,)`.
    pub fn free_energy(&self, batch: &NgramBatch<B>) -> Tensor<B, 1> {
        let [rows, n] = batch.tokens.dims();
        let [_, vocab] = self.visible_bias.val().dims();

        let embedded = self.embedding.forward(batch.tokens.clone()); // (rows, n, d)
        let [_, _, d] = embedded.dims();
        let pre_activation = self.hidden.forward(embedded.reshape([rows, n * d]));
        let hidden_term: Tensor<B, 1> = softplus(pre_activation).sum_dim(1).squeeze::<1>(1);

        let visible_term: Tensor<B, 1> = self
            .visible_bias
            .val()
            .reshape([n * vocab])
            .select(0, batch.bias_index.clone())
            .reshape([rows, n])
            .sum_dim(1)
            .squeeze::<1>(1);

        (visible_term + hidden_term).neg()
    }

    /// Every parameter tensor, flattened, with a stable name.
    pub fn named_parameters(&self) -> Vec<(String, Vec<f32>)> {
        let flat = |data: TensorData| data.iter::<f32>().collect::<Vec<f32>>();
        let mut params = vec![
            ("embedding".to_string(), flat(self.embedding.weight.val().into_data())),
            ("hidden.weight".to_string(), flat(self.hidden.weight.val().into_data())),
        ];
        if let Some(bias) = &self.hidden.bias {
            params.push(("hidden.bias".to_string(), flat(bias.val().into_data())));
        }
        params.push(("visible_bias".to_string(), flat(self.visible_bias.val().into_data())));
        params
    }
}

/// `ln(1 + e^x)` without overflow for large `x`.
fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone().clamp_min(0.0) + x.abs().neg().exp().log1p()
}
