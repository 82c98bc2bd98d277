//! Normalization stages
//!
//! The conv stages normalize in two different extents: the legacy block
//! normalizes each channel row over the trailing axis alone, while the
//! generalized block and both lift stages normalize over the whole
//! channel × length grid of a sample. The grid variant flattens to
//! `(batch, channels * len)`, applies a layer norm of that width (the same
//! affine parameter count as a two-axis norm) and restores the shape.

use burn::module::Module;
use burn::nn::{LayerNorm, LayerNormConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Layer normalization over `(batch, channels, len)`, in one of two extents.
#[derive(Module, Debug)]
pub struct StageNorm<B: Backend> {
    norm: LayerNorm<B>,
    #[module(skip)]
    flatten: bool,
    #[module(skip)]
    channels: usize,
    #[module(skip)]
    len: usize,
}

impl<B: Backend> StageNorm<B> {
    /// Normalize each channel row over the trailing axis independently.
    pub fn trailing(len: usize, device: &B::Device) -> Self {
        Self {
            norm: LayerNormConfig::new(len).init(device),
            flatten: false,
            channels: 0,
            len,
        }
    }

    /// Normalize over the joint channel × length grid of each sample.
    pub fn grid(channels: usize, len: usize, device: &B::Device) -> Self {
        Self {
            norm: LayerNormConfig::new(channels * len).init(device),
            flatten: true,
            channels,
            len,
        }
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        if !self.flatten {
            return self.norm.forward(input);
        }
        let batch = input.dims()[0];
        let flat = input.reshape([batch, self.channels * self.len]);
        self.norm
            .forward(flat)
            .reshape([batch, self.channels, self.len])
    }
}
