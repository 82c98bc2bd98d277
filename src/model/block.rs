//! Transposed conv block
//!
//! The workhorse of the model family: two strided downsampling convolutions
//! (over the shift×datapoint axis, then over the transform axis), each
//! followed by layer normalization and ReLU, an optional tanh bottleneck,
//! and the mirrored transpose convolutions that restore the original width
//! before the residual add.
//!
//! ```text
//! Input
//!   |
//!   +--> Conv1 -> LN -> ReLU -> Conv2 -> LN -> ReLU -> [bottleneck]
//!   |                                                       |
//!   |                      TConv1 <------------------- TConv2
//!   |                         |
//!   +------(residual add)-----+
//!   |
//!   v
//! Output (same shape as input)
//! ```
//!
//! The kernel/stride symmetry between each conv and its paired transpose
//! conv is what makes the residual add line up; it is verified once at
//! construction, so a shape mismatch can never surface at forward time.

use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig, ConvTranspose1d, ConvTranspose1dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::config::{ConfigError, NetConfig};
use super::norm::StageNorm;
use super::probe;

/// Down/up projecting pair applied to the trailing axis, tanh after each.
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    down: Linear<B>,
    up: Linear<B>,
}

impl<B: Backend> Bottleneck<B> {
    fn new(dim: usize, linear_dim: usize, device: &B::Device) -> Self {
        Self {
            down: LinearConfig::new(dim, linear_dim).with_bias(false).init(device),
            up: LinearConfig::new(linear_dim, dim).with_bias(false).init(device),
        }
    }

    fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = activation::tanh(self.down.forward(x));
        activation::tanh(self.up.forward(x))
    }
}

/// Residual encoder/decoder block over `(batch, conv_channel, seq_len)`.
#[derive(Module, Debug)]
pub struct TransposedConvBlock<B: Backend> {
    c1: Conv1d<B>,
    l1: StageNorm<B>,
    ct1: ConvTranspose1d<B>,
    c2: Conv1d<B>,
    l2: StageNorm<B>,
    ct2: ConvTranspose1d<B>,
    bottleneck: Option<Bottleneck<B>>,
    #[module(skip)]
    seq_len: usize,
}

impl<B: Backend> TransposedConvBlock<B> {
    /// Legacy geometry: the block width is the full feature grid
    /// `ticker × shift × datapoint × transform`, the first kernel is
    /// `shift × datapoint`, and each norm covers the trailing axis alone.
    pub fn legacy(config: &NetConfig, device: &B::Device) -> Result<Self, ConfigError> {
        config.validate_legacy()?;
        Self::with_geometry(
            config,
            config.legacy_input_dim(),
            config.legacy_kernel(),
            false,
            device,
        )
    }

    /// Generalized geometry: the caller supplies the per-ticker input width,
    /// the first kernel is `input_dim / transform_dim`, and each norm covers
    /// the whole channel × length grid.
    pub fn generalized(
        config: &NetConfig,
        input_dim: usize,
        device: &B::Device,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.validate_input_dim(input_dim)?;
        Self::with_geometry(
            config,
            input_dim * config.ticker_dim,
            config.c1_kernel(input_dim),
            true,
            device,
        )
    }

    fn with_geometry(
        config: &NetConfig,
        seq_len: usize,
        c1_kernel: usize,
        grid_norm: bool,
        device: &B::Device,
    ) -> Result<Self, ConfigError> {
        let channels = config.conv_channel();
        let norm = |len: usize| {
            if grid_norm {
                StageNorm::grid(channels, len, device)
            } else {
                StageNorm::trailing(len, device)
            }
        };

        let c1 = Conv1dConfig::new(channels, channels, c1_kernel)
            .with_stride(c1_kernel)
            .with_bias(false)
            .init(device);
        let dim_after_c1 = probe::probe_trailing_dim(&[&c1], channels, seq_len, device);
        let l1 = norm(dim_after_c1);
        let ct1 = ConvTranspose1dConfig::new([channels, channels], c1_kernel)
            .with_stride(c1_kernel)
            .init(device);

        let c2 = Conv1dConfig::new(channels, channels, config.transform_dim)
            .with_stride(config.transform_dim)
            .with_bias(false)
            .init(device);
        let dim_after_c2 = probe::probe_trailing_dim(&[&c1, &c2], channels, seq_len, device);
        let l2 = norm(dim_after_c2);
        let ct2 = ConvTranspose1dConfig::new([channels, channels], config.transform_dim)
            .with_stride(config.transform_dim)
            .init(device);

        // kernel == stride everywhere, so the mirrored stack expands each
        // probed width back by the same factors
        let reconstructed = dim_after_c2 * config.transform_dim * c1_kernel;
        if reconstructed != seq_len {
            return Err(ConfigError::ResidualMismatch {
                expected: seq_len,
                reconstructed,
            });
        }

        let bottleneck = if config.linear_dim > 0 {
            Some(Bottleneck::new(dim_after_c2, config.linear_dim, device))
        } else {
            None
        };

        Ok(Self {
            c1,
            l1,
            ct1,
            c2,
            l2,
            ct2,
            bottleneck,
            seq_len,
        })
    }

    /// Width of the trailing axis this block was built for.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Forward pass over `(batch, conv_channel, seq_len)`; output shape
    /// equals input shape.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let out = activation::relu(self.l1.forward(self.c1.forward(input.clone())));
        let out = activation::relu(self.l2.forward(self.c2.forward(out)));

        let out = match &self.bottleneck {
            Some(bottleneck) => bottleneck.forward(out),
            None => out,
        };

        let out = self.ct2.forward(out);
        self.ct1.forward(out) + input
    }
}
