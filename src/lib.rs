//! Convolutional encoder/decoder models for per-ticker return
//! classification.
//!
//! The crate turns daily OHLCV series into shift-grid feature rows, scales
//! them through a four-way scaler union, and trains a family of 1-D
//! convolutional models to predict whether each ticker's forward return
//! clears a threshold:
//!
//! - [`model::TransposedConvBlock`]: residual strided conv encoder/decoder
//! - [`model::ConvNet`]: the full wrapper network with lift and head stages
//! - [`model::DualPathClassifier`]: a shallow linear + conv alternative
//!
//! Training runs a fixed-epoch BCE/Adam loop with periodic evaluation over
//! both splits; metrics include a positive statistic over the raw forward
//! returns of the samples the model flags.

pub mod data;
pub mod metrics;
pub mod model;
pub mod training;

/// Common imports for downstream code.
pub mod prelude {
    pub use crate::data::{
        build_datasets, generate_synthetic, load_tickers, DatasetBundle, DatasetConfig,
        ScalerUnion, ShiftGrid, SupervisedDataset, TickerSeries,
    };
    pub use crate::metrics::{ConfusionMatrix, EpochMetrics, EpochRecorder};
    pub use crate::model::{
        ConfigError, ConvNet, DualPathClassifier, NetConfig, ProbabilityModel,
    };
    pub use crate::training::{
        EpochObserver, EpochReport, RunLogger, Split, TrainConfig, TrainHistory, Trainer,
    };
}
