//! Training loss

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Mean binary cross entropy over probabilities.
///
/// Both log terms are clamped at -100 so a saturated sigmoid cannot produce
/// an infinite loss. Inputs are `(batch, output_dim)`; the result is a scalar
/// tensor.
pub fn binary_cross_entropy<B: Backend>(
    predictions: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_p = predictions.clone().log().clamp_min(-100.0);
    let log_not_p = predictions.neg().add_scalar(1.0).log().clamp_min(-100.0);
    let complement = targets.clone().neg().add_scalar(1.0);

    (targets * log_p + complement * log_not_p).neg().mean()
}
