//! Model configuration
//!
//! Structural hyperparameters shared by the conv block family. The config is
//! fixed at model construction and never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while constructing a model from a [`NetConfig`].
///
/// All of these are construction-time failures: no partially built model is
/// ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("output_dim ({output_dim}) must be divisible by ticker_dim ({ticker_dim})")]
    OutputNotDivisible { output_dim: usize, ticker_dim: usize },

    #[error("input_dim ({input_dim}) must be divisible by transform_dim ({transform_dim})")]
    InputNotDivisible { input_dim: usize, transform_dim: usize },

    #[error("{name} must be non-zero")]
    ZeroDimension { name: &'static str },

    #[error("conv/transpose-conv stack reconstructs length {reconstructed}, expected {expected}")]
    ResidualMismatch { expected: usize, reconstructed: usize },

    #[error("head produces {produced} values per sample, expected output_dim {output_dim}")]
    HeadMismatch { produced: usize, output_dim: usize },
}

/// Structural hyperparameters for the conv block family.
///
/// * `ticker_dim`: number of tickers covered by one feature row
/// * `data_point_dim`: values per data point (OHLC + volume = 5)
/// * `shift_dim`: number of time shifts in the feature grid
/// * `transform_dim`: number of scaler transforms applied to the raw frame
/// * `output_dim`: output width, a multiple of `ticker_dim`
/// * `const_factor`: channel multiplier for the conv stages
/// * `block_depth`: number of stacked transposed conv blocks
/// * `linear_dim`: bottleneck width inside each block, 0 disables it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetConfig {
    pub ticker_dim: usize,
    pub data_point_dim: usize,
    pub shift_dim: usize,
    pub transform_dim: usize,
    pub output_dim: usize,
    pub const_factor: usize,
    pub block_depth: usize,
    pub linear_dim: usize,
}

impl NetConfig {
    /// Validate the divisibility invariants shared by every model variant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ticker_dim", self.ticker_dim),
            ("transform_dim", self.transform_dim),
            ("output_dim", self.output_dim),
            ("const_factor", self.const_factor),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDimension { name });
            }
        }
        if self.output_dim % self.ticker_dim != 0 {
            return Err(ConfigError::OutputNotDivisible {
                output_dim: self.output_dim,
                ticker_dim: self.ticker_dim,
            });
        }
        Ok(())
    }

    /// Additional checks for the legacy variant, whose input width is derived
    /// from the feature grid.
    pub fn validate_legacy(&self) -> Result<(), ConfigError> {
        self.validate()?;
        for (name, value) in [
            ("data_point_dim", self.data_point_dim),
            ("shift_dim", self.shift_dim),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDimension { name });
            }
        }
        Ok(())
    }

    /// Additional checks for the generalized variant, whose per-ticker input
    /// width is supplied by the caller.
    pub fn validate_input_dim(&self, input_dim: usize) -> Result<(), ConfigError> {
        if input_dim == 0 {
            return Err(ConfigError::ZeroDimension { name: "input_dim" });
        }
        if input_dim % self.transform_dim != 0 {
            return Err(ConfigError::InputNotDivisible {
                input_dim,
                transform_dim: self.transform_dim,
            });
        }
        Ok(())
    }

    /// Outputs per ticker.
    pub fn label_dim(&self) -> usize {
        self.output_dim / self.ticker_dim
    }

    /// Channel count used by the conv stages.
    pub fn conv_channel(&self) -> usize {
        self.label_dim() * self.const_factor
    }

    /// Full input width of the legacy variant.
    pub fn legacy_input_dim(&self) -> usize {
        self.ticker_dim * self.shift_dim * self.data_point_dim * self.transform_dim
    }

    /// Kernel (and stride) of the first conv stage in the legacy variant.
    pub fn legacy_kernel(&self) -> usize {
        self.shift_dim * self.data_point_dim
    }

    /// Kernel (and stride) of the first conv stage in the generalized
    /// variant, for a caller-supplied per-ticker input width.
    pub fn c1_kernel(&self, input_dim: usize) -> usize {
        input_dim / self.transform_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> NetConfig {
        NetConfig {
            ticker_dim: 3,
            data_point_dim: 5,
            shift_dim: 4,
            transform_dim: 4,
            output_dim: 12,
            const_factor: 2,
            block_depth: 1,
            linear_dim: 0,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = base_config();
        assert!(config.validate().is_ok());
        assert!(config.validate_legacy().is_ok());
        assert_eq!(config.label_dim(), 4);
        assert_eq!(config.conv_channel(), 8);
        assert_eq!(config.legacy_input_dim(), 3 * 5 * 4 * 4);
        assert_eq!(config.legacy_kernel(), 20);
    }

    #[test]
    fn test_output_not_divisible() {
        let config = NetConfig {
            output_dim: 10,
            ..base_config()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutputNotDivisible {
                output_dim: 10,
                ticker_dim: 3
            })
        );
    }

    #[test]
    fn test_input_not_divisible() {
        let config = base_config();
        assert_eq!(
            config.validate_input_dim(21),
            Err(ConfigError::InputNotDivisible {
                input_dim: 21,
                transform_dim: 4
            })
        );
        assert!(config.validate_input_dim(20).is_ok());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = NetConfig {
            ticker_dim: 0,
            ..base_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDimension { name: "ticker_dim" })
        ));

        // shift_dim only matters for the legacy geometry
        let config = NetConfig {
            shift_dim: 0,
            ..base_config()
        };
        assert!(config.validate().is_ok());
        assert!(config.validate_legacy().is_err());
    }
}
