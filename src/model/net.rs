//! Encoder/decoder network
//!
//! Wraps the transposed conv block stack with a lift stage that raises the
//! flat feature row to `conv_channel` channels, and a two-stage reducing head
//! that collapses the channel/length grid down to `output_dim` probabilities.

use burn::module::Module;
use burn::nn::conv::{Conv1d, Conv1dConfig, ConvTranspose1d, ConvTranspose1dConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::block::TransposedConvBlock;
use super::config::{ConfigError, NetConfig};
use super::norm::StageNorm;
use super::probe;
use super::ProbabilityModel;

/// Stacked residual conv model producing per-ticker outcome probabilities.
///
/// Pipeline: lift `(batch, seq_len)` to `(batch, conv_channel, seq_len)`,
/// run `block_depth` residual blocks, then reduce twice (by the first-stage
/// kernel, then by `transform_dim`) into `label_dim` channels, flatten to
/// `(batch, output_dim)` and squash through sigmoid.
#[derive(Module, Debug)]
pub struct ConvNet<B: Backend> {
    lift_conv: Conv1d<B>,
    lift_norm: StageNorm<B>,
    lift_tconv: ConvTranspose1d<B>,
    blocks: Vec<TransposedConvBlock<B>>,
    reduce: Conv1d<B>,
    head: Conv1d<B>,
    #[module(skip)]
    output_dim: usize,
    #[module(skip)]
    seq_len: usize,
}

impl<B: Backend> ConvNet<B> {
    /// Legacy geometry over the full `ticker × shift × datapoint × transform`
    /// feature grid.
    pub fn legacy(config: &NetConfig, device: &B::Device) -> Result<Self, ConfigError> {
        config.validate_legacy()?;
        let blocks = (0..config.block_depth)
            .map(|_| TransposedConvBlock::legacy(config, device))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_geometry(
            config,
            config.legacy_input_dim(),
            config.legacy_kernel(),
            blocks,
            device,
        )
    }

    /// Generalized geometry for a caller-supplied per-ticker input width.
    pub fn generalized(
        config: &NetConfig,
        input_dim: usize,
        device: &B::Device,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.validate_input_dim(input_dim)?;
        let blocks = (0..config.block_depth)
            .map(|_| TransposedConvBlock::generalized(config, input_dim, device))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_geometry(
            config,
            input_dim * config.ticker_dim,
            config.c1_kernel(input_dim),
            blocks,
            device,
        )
    }

    fn with_geometry(
        config: &NetConfig,
        seq_len: usize,
        c1_kernel: usize,
        blocks: Vec<TransposedConvBlock<B>>,
        device: &B::Device,
    ) -> Result<Self, ConfigError> {
        let channels = config.conv_channel();
        let label_dim = config.label_dim();

        let lift_conv = Conv1dConfig::new(1, channels, c1_kernel)
            .with_stride(c1_kernel)
            .with_bias(false)
            .init(device);
        let lifted_dim = probe::probe_trailing_dim(&[&lift_conv], 1, seq_len, device);
        // the lift stage normalizes over the whole channel × length grid in
        // both variants
        let lift_norm = StageNorm::grid(channels, lifted_dim, device);
        let lift_tconv = ConvTranspose1dConfig::new([channels, channels], c1_kernel)
            .with_stride(c1_kernel)
            .init(device);

        let reduce = Conv1dConfig::new(channels, channels, c1_kernel)
            .with_stride(c1_kernel)
            .with_bias(false)
            .init(device);
        let head = Conv1dConfig::new(channels, label_dim, config.transform_dim)
            .with_stride(config.transform_dim)
            .with_bias(false)
            .init(device);

        // the flatten at the end assumes the head emits exactly
        // output_dim values per sample
        let final_len = probe::probe_trailing_dim(&[&reduce, &head], channels, seq_len, device);
        let produced = label_dim * final_len;
        if produced != config.output_dim {
            return Err(ConfigError::HeadMismatch {
                produced,
                output_dim: config.output_dim,
            });
        }

        Ok(Self {
            lift_conv,
            lift_norm,
            lift_tconv,
            blocks,
            reduce,
            head,
            output_dim: config.output_dim,
            seq_len,
        })
    }

    /// Flat input width this model was built for.
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

impl<B: Backend> ProbabilityModel<B> for ConvNet<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let batch = input.dims()[0];

        let out = input.unsqueeze_dim::<3>(1);
        let out = activation::relu(self.lift_norm.forward(self.lift_conv.forward(out)));
        let mut out = self.lift_tconv.forward(out);

        for block in &self.blocks {
            out = block.forward(out);
        }

        let out = self.reduce.forward(out);
        let out = self.head.forward(out);
        activation::sigmoid(out.reshape([batch, self.output_dim]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    #[test]
    fn test_legacy_net_output_shape_and_range() {
        let device = Default::default();
        let config = NetConfig {
            ticker_dim: 2,
            data_point_dim: 5,
            shift_dim: 3,
            transform_dim: 4,
            output_dim: 4,
            const_factor: 2,
            block_depth: 2,
            linear_dim: 0,
        };

        let net = ConvNet::<TestBackend>::legacy(&config, &device).unwrap();
        assert_eq!(net.seq_len(), config.legacy_input_dim());

        let input = Tensor::<TestBackend, 2>::random(
            [3, net.seq_len()],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = net.forward(input);
        assert_eq!(output.dims(), [3, 4]);

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_generalized_net_output_shape() {
        let device = Default::default();
        let config = NetConfig {
            ticker_dim: 1,
            data_point_dim: 0,
            shift_dim: 0,
            transform_dim: 4,
            output_dim: 1,
            const_factor: 2,
            block_depth: 1,
            linear_dim: 0,
        };

        let net = ConvNet::<TestBackend>::generalized(&config, 20, &device).unwrap();
        let input = Tensor::<TestBackend, 2>::random(
            [4, 20],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let output = net.forward(input);
        assert_eq!(output.dims(), [4, 1]);

        let values = output.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_legacy_and_generalized_share_geometry() {
        let device = Default::default();
        let config = NetConfig {
            ticker_dim: 2,
            data_point_dim: 5,
            shift_dim: 3,
            transform_dim: 4,
            output_dim: 2,
            const_factor: 2,
            block_depth: 1,
            linear_dim: 0,
        };
        // per-ticker width of the legacy feature grid
        let input_dim = config.shift_dim * config.data_point_dim * config.transform_dim;

        let legacy = ConvNet::<TestBackend>::legacy(&config, &device).unwrap();
        let generalized =
            ConvNet::<TestBackend>::generalized(&config, input_dim, &device).unwrap();
        assert_eq!(legacy.seq_len(), generalized.seq_len());
        assert_eq!(legacy.output_dim(), generalized.output_dim());

        let input = Tensor::<TestBackend, 2>::random(
            [3, legacy.seq_len()],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        assert_eq!(
            legacy.forward(input.clone()).dims(),
            generalized.forward(input).dims()
        );
    }

    #[test]
    fn test_net_rejects_invalid_config() {
        let device = Default::default();
        let config = NetConfig {
            ticker_dim: 3,
            data_point_dim: 5,
            shift_dim: 3,
            transform_dim: 4,
            output_dim: 7,
            const_factor: 2,
            block_depth: 1,
            linear_dim: 0,
        };
        assert!(matches!(
            ConvNet::<TestBackend>::legacy(&config, &device),
            Err(ConfigError::OutputNotDivisible { .. })
        ));
    }
}
