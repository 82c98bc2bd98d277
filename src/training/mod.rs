//! Training loop, loss and run logging.

pub mod logger;
pub mod loss;
pub mod trainer;

pub use logger::RunLogger;
pub use loss::binary_cross_entropy;
pub use trainer::{
    evaluate, EpochObserver, EpochReport, Split, TrainConfig, TrainHistory, Trainer,
};
