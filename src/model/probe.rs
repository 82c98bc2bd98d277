//! Shape probing
//!
//! The strided conv stages shrink the trailing axis by amounts that depend on
//! kernel/stride geometry. Instead of duplicating that arithmetic, a
//! synthetic all-ones tensor with batch size 1 is pushed through the already
//! built layers and the resulting dims are read off. The probe runs once per
//! constructed stack; results are baked into the immutable layer geometry and
//! never recomputed per forward call.

use burn::nn::conv::Conv1d;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Run an all-ones `[1, channels, len]` tensor through `layers` in order and
/// return the output dims.
///
/// Pure with respect to the layers: nothing here tracks gradients or touches
/// parameters, so the probe is deterministic and re-runnable.
pub fn probe_conv_stack<B: Backend>(
    layers: &[&Conv1d<B>],
    channels: usize,
    len: usize,
    device: &B::Device,
) -> [usize; 3] {
    let mut probe = Tensor::<B, 3>::ones([1, channels, len], device).detach();
    for layer in layers {
        probe = layer.forward(probe).detach();
    }
    probe.dims()
}

/// Trailing-axis length produced by `layers` for an input of width `len`.
pub fn probe_trailing_dim<B: Backend>(
    layers: &[&Conv1d<B>],
    channels: usize,
    len: usize,
    device: &B::Device,
) -> usize {
    probe_conv_stack(layers, channels, len, device)[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::conv::Conv1dConfig;

    type TestBackend = NdArray;

    #[test]
    fn test_probe_single_conv() {
        let device = Default::default();
        // kernel == stride == 5 over 40 points: 40 / 5 = 8
        let conv = Conv1dConfig::new(4, 4, 5)
            .with_stride(5)
            .with_bias(false)
            .init::<TestBackend>(&device);

        let dims = probe_conv_stack(&[&conv], 4, 40, &device);
        assert_eq!(dims, [1, 4, 8]);
    }

    #[test]
    fn test_probe_stack_is_rerunnable() {
        let device = Default::default();
        let c1 = Conv1dConfig::new(2, 2, 4)
            .with_stride(4)
            .with_bias(false)
            .init::<TestBackend>(&device);
        let c2 = Conv1dConfig::new(2, 2, 2)
            .with_stride(2)
            .with_bias(false)
            .init::<TestBackend>(&device);

        let first = probe_conv_stack(&[&c1, &c2], 2, 32, &device);
        let second = probe_conv_stack(&[&c1, &c2], 2, 32, &device);
        assert_eq!(first, [1, 2, 4]);
        assert_eq!(first, second);

        // probing the prefix alone must agree with the full run
        assert_eq!(probe_trailing_dim(&[&c1], 2, 32, &device), 8);
    }
}
