//! Training entry point.
//!
//! Loads per-ticker OHLCV CSVs (or generates a synthetic walk when no files
//! are available), assembles the shift-grid datasets, builds the requested
//! model and runs the fixed-epoch training loop with the logging sink
//! attached.

use std::path::PathBuf;

use anyhow::{bail, Context};
use burn::backend::{Autodiff, NdArray};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_conv_trading::prelude::*;

type TrainBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    /// Residual encoder/decoder network.
    Conv,
    /// Shallow dual-path classifier.
    Classifier,
}

#[derive(Debug, Parser)]
#[command(name = "train", about = "Train a return classifier on OHLCV data")]
struct Args {
    /// Directory holding one `<ticker>.csv` file per ticker.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Comma-separated ticker list.
    #[arg(long, value_delimiter = ',', default_value = "AAA,BBB,CCC")]
    tickers: Vec<String>,

    /// Directory for run logs.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = ModelKind::Conv)]
    model: ModelKind,

    #[arg(long, default_value_t = 600)]
    max_epoch: usize,

    #[arg(long, default_value_t = 50)]
    print_every: usize,

    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Forward-return threshold for the binary target; negative values flip
    /// the comparison to `< threshold`.
    #[arg(long, default_value_t = 0.02)]
    threshold: f64,

    #[arg(long, default_value_t = 0.01)]
    learning_rate: f64,

    #[arg(long, default_value_t = 1e-6)]
    weight_decay: f64,

    /// Values per data point (OHLC + volume = 5).
    #[arg(long, default_value_t = 5)]
    data_point_dim: usize,

    /// Scaled copies per raw feature; must match the scaler union.
    #[arg(long, default_value_t = 4)]
    transform_dim: usize,

    #[arg(long, default_value_t = 3)]
    shift_increment: usize,

    #[arg(long, default_value_t = 3)]
    min_shift_forward: usize,

    #[arg(long, default_value_t = 10)]
    max_shift_forward: usize,

    #[arg(long, default_value_t = 2)]
    const_factor: usize,

    #[arg(long, default_value_t = 1)]
    block_depth: usize,

    /// Bottleneck width inside each block; 0 disables it.
    #[arg(long, default_value_t = 0)]
    linear_dim: usize,

    /// Fraction of aligned days used for training.
    #[arg(long, default_value_t = 0.8)]
    train_fraction: f64,

    /// Days of synthetic data when no CSV files are found.
    #[arg(long, default_value_t = 500)]
    synthetic_days: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    if args.transform_dim != ScalerUnion::TRANSFORM_COUNT {
        bail!(
            "transform_dim {} does not match the scaler union ({} transforms)",
            args.transform_dim,
            ScalerUnion::TRANSFORM_COUNT
        );
    }
    if args.max_shift_forward <= args.min_shift_forward {
        bail!("max_shift_forward must exceed min_shift_forward");
    }

    let mut series = load_tickers(&args.data_dir, &args.tickers);
    if series.is_empty() {
        warn!(
            data_dir = %args.data_dir.display(),
            "no ticker files found, generating synthetic series"
        );
        series = generate_synthetic(&args.tickers, args.synthetic_days, args.seed);
    }

    let grid = ShiftGrid::new(
        args.min_shift_forward,
        args.max_shift_forward,
        args.shift_increment,
    );
    let dataset_config = DatasetConfig {
        data_point_dim: args.data_point_dim,
        grid: grid.clone(),
        horizon: args.min_shift_forward,
        threshold: args.threshold,
        train_fraction: args.train_fraction,
    };
    let bundle = build_datasets(&series, &dataset_config).context("building datasets")?;

    info!(
        tickers = bundle.ticker_dim,
        feature_dim = bundle.feature_dim,
        train_samples = bundle.train.len(),
        test_samples = bundle.test.len(),
        shift_dim = grid.shift_dim(),
        "datasets ready"
    );

    let net_config = NetConfig {
        ticker_dim: bundle.ticker_dim,
        data_point_dim: args.data_point_dim,
        shift_dim: grid.shift_dim(),
        transform_dim: args.transform_dim,
        output_dim: bundle.ticker_dim,
        const_factor: args.const_factor,
        block_depth: args.block_depth,
        linear_dim: args.linear_dim,
    };

    let device = Default::default();
    let logger = RunLogger::create(&args.log_dir, args.threshold).context("creating run log")?;
    info!(stat_file = %logger.stat_path().display(), "logging stat lines");

    let train_config = TrainConfig {
        max_epoch: args.max_epoch,
        print_every: args.print_every,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        weight_decay: args.weight_decay,
        positive_threshold: 0.5,
    };
    let trainer =
        Trainer::<TrainBackend>::new(train_config, device).with_observer(Box::new(logger));

    let history = match args.model {
        ModelKind::Conv => {
            // per-ticker input width of the assembled feature rows
            let input_dim = grid.shift_dim() * args.data_point_dim * args.transform_dim;
            let model = ConvNet::<TrainBackend>::generalized(&net_config, input_dim, &device)?;
            let (_model, history) = trainer.run(model, &bundle.train, &bundle.test);
            history
        }
        ModelKind::Classifier => {
            let model = DualPathClassifier::<TrainBackend>::new(&net_config, &device)?;
            let (_model, history) = trainer.run(model, &bundle.train, &bundle.test);
            history
        }
    };

    if let Some(last) = history.train_losses.last() {
        info!(final_loss = *last, epochs = history.train_losses.len(), "run complete");
    }

    Ok(())
}
