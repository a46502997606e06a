//! Contrastive objective for free-energy training.
//!
//! Every observed n-gram is scored against `K` corrupted copies whose
//! conditioned term was resampled uniformly over the vocabulary. The loss is
//! the InfoNCE cross-entropy of picking the observed row, which is the
//! log-loss of the model's conditional restricted to `K + 1` candidates.
//! Convention: lower free energy = more probable n-gram.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;
use rand::Rng;

use corpus::NgramMatrix;

use crate::model::bridge::NgramBatch;
use crate::model::lrbm::LrbmNet;

/// InfoNCE loss over free energies.
///
/// - `pos_energy`: shape `(batch,)`, free energy of the observed rows
/// - `neg_energies`: shape `(batch, K)`, free energies of the corrupted copies
///
/// Returns a scalar tensor of shape `(1,)`.
pub fn info_nce_loss<B: Backend>(
    pos_energy: Tensor<B, 1>,
    neg_energies: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let device = pos_energy.device();
    let [batch_size, _k] = neg_energies.dims();

    // Lower energy = higher logit. The observed row is class 0.
    let logits = Tensor::cat(
        vec![pos_energy.neg().unsqueeze_dim::<2>(1), neg_energies.neg()],
        1,
    ); // (batch, K+1)
    let labels = Tensor::<B, 1, Int>::zeros([batch_size], &device);

    CrossEntropyLossConfig::new()
        .init(&device)
        .forward(logits, labels)
}

/// `k` corrupted copies of every row, grouped by source row: copy `j` of row
/// `i` lands at row `i * k + j`. Only column 0 is resampled.
pub fn corrupt_conditioned(
    batch: &NgramMatrix,
    vocab_size: usize,
    k: usize,
    rng: &mut impl Rng,
) -> NgramMatrix {
    let mut negatives = batch.repeat_rows(k);
    let resampled: Vec<u32> = (0..negatives.len())
        .map(|_| rng.gen_range(0..vocab_size as u32))
        .collect();
    negatives.set_column(0, &resampled);
    negatives
}

/// Contrastive loss of `net` on a non-empty `batch` with its `negatives`
/// from [`corrupt_conditioned`].
pub fn contrastive_loss<B: Backend>(
    net: &LrbmNet<B>,
    batch: &NgramMatrix,
    negatives: &NgramMatrix,
    vocab_size: usize,
    device: &B::Device,
) -> Tensor<B, 1> {
    let rows = batch.len();
    let k = negatives.len() / rows;
    let pos = net.free_energy(&NgramBatch::from_matrix(batch, vocab_size, device));
    let neg = net
        .free_energy(&NgramBatch::from_matrix(negatives, vocab_size, device))
        .reshape([rows, k]);
    info_nce_loss(pos, neg)
}
