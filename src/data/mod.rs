//! Data pipeline: CSV loading, shift-grid feature engineering, scaler union
//! and mini-batch assembly.

pub mod dataset;
pub mod transform;

pub use dataset::{
    binary_target, build_datasets, generate_synthetic, load_tickers, DataError, DatasetBundle,
    DatasetConfig, FeatureBatch, OhlcvRow, ShiftGrid, SupervisedDataset, TickerSeries,
};
pub use transform::ScalerUnion;
