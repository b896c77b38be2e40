// ============================================================
// Layer 4: Point Batcher
// ============================================================
// Turns selected rows of a row-major sample buffer into a Burn
// tensor of shape [rows, dim], and index lists into Int tensors
// for `select`.
//
// Rows are gathered into one flat Vec<f32> first, then handed to
// Burn as a 1-D tensor and reshaped, so the device sees a single
// upload per batch.

use burn::prelude::*;

#[derive(Clone, Debug)]
pub struct PointBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,
}

impl<B: Backend> PointBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// Rows `indices` of `values` as a [indices.len(), dim] tensor.
    pub fn rows(&self, values: &[f32], dim: usize, indices: &[usize]) -> Tensor<B, 2> {
        let flat: Vec<f32> = indices
            .iter()
            .flat_map(|&i| values[i * dim..(i + 1) * dim].iter().copied())
            .collect();
        self.matrix(&flat, indices.len(), dim)
    }

    /// A whole row-major buffer as a [rows, dim] tensor.
    pub fn matrix(&self, flat: &[f32], rows: usize, dim: usize) -> Tensor<B, 2> {
        Tensor::<B, 1>::from_floats(flat, &self.device).reshape([rows, dim])
    }

    /// A column vector [len, 1], used for per-edge and per-node weights.
    pub fn column(&self, values: &[f32]) -> Tensor<B, 2> {
        self.matrix(values, values.len(), 1)
    }

    /// Index list as a 1-D Int tensor for `Tensor::select`.
    pub fn indices(&self, indices: &[usize]) -> Tensor<B, 1, Int> {
        let ints: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
        Tensor::<B, 1, Int>::from_ints(ints.as_slice(), &self.device)
    }
}
