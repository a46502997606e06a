//! Tensor bridge: conversions between CPU n-gram matrices and burn tensors.
//!
//! Token ids live on the CPU as `u32` rows; the network needs `Int` tensors
//! on its device, plus the flat offsets into the `[n, vocab]` visible-bias
//! table that each token selects.

use burn::prelude::*;
use burn::tensor::TensorData;

use corpus::NgramMatrix;

/// An n-gram batch placed on a burn device.
#[derive(Debug, Clone)]
pub struct NgramBatch<B: Backend> {
    /// Token ids, shape `(rows, n)`.
    pub tokens: Tensor<B, 2, Int>,
    /// `position * vocab_size + token` for every cell, shape `(rows * n,)`.
    pub bias_index: Tensor<B, 1, Int>,
}

impl<B: Backend> NgramBatch<B> {
    /// Upload `matrix` to `device`.
    ///
    /// # Panics
    /// Panics if `matrix` is empty. Callers guard on `is_empty()` first.
    pub fn from_matrix(matrix: &NgramMatrix, vocab_size: usize, device: &B::Device) -> Self {
        assert!(!matrix.is_empty(), "cannot upload an empty n-gram batch");
        let (rows, n) = matrix.shape();

        let tokens: Vec<i64> = matrix.as_slice().iter().map(|&t| t as i64).collect();
        let bias_index: Vec<i64> = matrix
            .rows()
            .flat_map(|row| {
                row.iter()
                    .enumerate()
                    .map(move |(pos, &t)| (pos * vocab_size) as i64 + t as i64)
            })
            .collect();

        Self {
            tokens: Tensor::from_data(TensorData::new(tokens, [rows, n]), device),
            bias_index: Tensor::from_data(TensorData::new(bias_index, [rows * n]), device),
        }
    }

    pub fn rows(&self) -> usize {
        self.tokens.dims()[0]
    }
}

/// Extract f64 values from a burn 1D tensor.
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    tensor.into_data().iter::<f32>().map(f64::from).collect()
}
