//! Model family: residual transposed-conv blocks, the encoder/decoder
//! network built from them, and the dual-path classifier.

pub mod block;
pub mod classifier;
pub mod config;
pub mod net;
pub mod norm;
pub mod probe;

pub use block::TransposedConvBlock;
pub use classifier::DualPathClassifier;
pub use config::{ConfigError, NetConfig};
pub use net::ConvNet;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// A model mapping a batch of flat feature rows to per-output probabilities
/// in `[0, 1]`.
///
/// Both the training loop and the evaluators only need this surface; which
/// architecture sits behind it is a run-time choice.
pub trait ProbabilityModel<B: Backend> {
    /// `(batch, input_dim)` in, `(batch, output_dim)` of probabilities out.
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;
}
