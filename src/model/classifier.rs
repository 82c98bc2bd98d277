//! Dual-path classifier
//!
//! A shallow alternative to the encoder/decoder stack: one dense path and one
//! strided conv path run side by side, get broadcast to a common shape by
//! repeating the smaller one, and are summed before a 1×1 conv head.

use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::config::{ConfigError, NetConfig};
use super::probe;
use super::ProbabilityModel;

/// Linear + conv two-path model over the legacy feature grid.
///
/// Unlike [`super::ConvNet`], the channel count here is `label_dim` itself;
/// `const_factor` does not apply.
#[derive(Module, Debug)]
pub struct DualPathClassifier<B: Backend> {
    l1: Linear<B>,
    c1: Conv1d<B>,
    c2: Conv1d<B>,
    c3: Conv1d<B>,
    #[module(skip)]
    linear_repeat: [usize; 3],
    #[module(skip)]
    conv_repeat: [usize; 3],
    #[module(skip)]
    seq_len: usize,
    #[module(skip)]
    output_dim: usize,
}

impl<B: Backend> DualPathClassifier<B> {
    pub fn new(config: &NetConfig, device: &B::Device) -> Result<Self, ConfigError> {
        config.validate_legacy()?;

        let seq_len = config.legacy_input_dim();
        let kernel = config.legacy_kernel();
        let channels = config.label_dim();

        let l1 = LinearConfig::new(seq_len, config.output_dim).init(device);
        let c1 = Conv1dConfig::new(1, channels, kernel)
            .with_stride(kernel)
            .with_bias(false)
            .init(device);
        let c2 = Conv1dConfig::new(channels, channels, config.transform_dim)
            .with_stride(config.transform_dim)
            .with_bias(false)
            .init(device);
        let c3 = Conv1dConfig::new(channels, 1, 1).init(device);

        let conv_shape = probe::probe_conv_stack(&[&c1, &c2], 1, seq_len, device);
        let linear_shape = [1, 1, config.output_dim];

        // shape reconciliation by integer division: per axis, the smaller
        // path is repeated by the truncated ratio of the larger one
        let mut linear_repeat = [1usize; 3];
        let mut conv_repeat = [1usize; 3];
        for axis in 0..3 {
            let ratio = conv_shape[axis] as f64 / linear_shape[axis] as f64;
            if ratio >= 1.0 {
                linear_repeat[axis] = ratio as usize;
            } else {
                conv_repeat[axis] = (1.0 / ratio) as usize;
            }
        }

        Ok(Self {
            l1,
            c1,
            c2,
            c3,
            linear_repeat,
            conv_repeat,
            seq_len,
            output_dim: config.output_dim,
        })
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn repeat_axes(mut tensor: Tensor<B, 3>, repeats: [usize; 3]) -> Tensor<B, 3> {
        for (axis, &times) in repeats.iter().enumerate() {
            if times > 1 {
                tensor = tensor.repeat_dim(axis, times);
            }
        }
        tensor
    }
}

impl<B: Backend> ProbabilityModel<B> for DualPathClassifier<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let linear = activation::relu(self.l1.forward(input.clone())).unsqueeze_dim::<3>(1);
        let linear = Self::repeat_axes(linear, self.linear_repeat);

        let conv = input.unsqueeze_dim::<3>(1);
        let conv = activation::relu(self.c1.forward(conv));
        let conv = activation::relu(self.c2.forward(conv));
        let conv = Self::repeat_axes(conv, self.conv_repeat);

        let out = linear + conv;
        activation::sigmoid(self.c3.forward(out)).squeeze::<2>(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn config() -> NetConfig {
        NetConfig {
            ticker_dim: 2,
            data_point_dim: 5,
            shift_dim: 3,
            transform_dim: 4,
            output_dim: 4,
            const_factor: 1,
            block_depth: 1,
            linear_dim: 0,
        }
    }

    #[test]
    fn test_classifier_output_shape_and_range() {
        let device = Default::default();
        let model = DualPathClassifier::<TestBackend>::new(&config(), &device).unwrap();
        assert_eq!(model.seq_len(), 2 * 3 * 5 * 4);

        let input = Tensor::<TestBackend, 2>::random(
            [5, model.seq_len()],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = model.forward(input);
        assert_eq!(output.dims(), [5, 4]);

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_classifier_repeat_reconciliation() {
        // conv path ends at width ticker_dim (2) against output_dim (4):
        // the conv output gets repeated twice along the trailing axis
        let device = Default::default();
        let model = DualPathClassifier::<TestBackend>::new(&config(), &device).unwrap();
        assert_eq!(model.conv_repeat, [1, 1, 2]);
        assert_eq!(model.linear_repeat, [1, 2, 1]);
    }

    #[test]
    fn test_classifier_rejects_indivisible_output() {
        let device = Default::default();
        let cfg = NetConfig {
            output_dim: 5,
            ..config()
        };
        assert!(DualPathClassifier::<TestBackend>::new(&cfg, &device).is_err());
    }
}
