//! Dataset assembly
//!
//! Per-ticker OHLCV series come in as CSV files; each day becomes one sample
//! whose features are the data-point values at every shift of the shift grid,
//! concatenated across tickers, scaled by the fitted union. The label per
//! ticker is whether its forward return clears the threshold; the raw forward
//! returns are kept alongside for the positive statistic.

use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::transform::ScalerUnion;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("ticker {ticker} has {rows} rows, needs at least {needed}")]
    TooShort {
        ticker: String,
        rows: usize,
        needed: usize,
    },

    #[error("no usable ticker series")]
    NoTickers,
}

/// One OHLCV row of a daily ticker file.
#[derive(Debug, Clone, Deserialize)]
pub struct OhlcvRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvRow {
    /// First `data_point_dim` values in OHLCV order.
    fn data_points(&self, data_point_dim: usize) -> Vec<f64> {
        let all = [self.open, self.high, self.low, self.close, self.volume];
        all[..data_point_dim.min(all.len())].to_vec()
    }
}

/// A loaded daily series for one ticker.
#[derive(Debug, Clone)]
pub struct TickerSeries {
    pub ticker: String,
    pub rows: Vec<OhlcvRow>,
}

impl TickerSeries {
    pub fn load_csv(ticker: &str, path: &Path) -> Result<Self, DataError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<OhlcvRow>, _>>()
            .map_err(|source| DataError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            ticker: ticker.to_string(),
            rows,
        })
    }
}

/// Load `<data_dir>/<ticker>.csv` for every requested ticker.
///
/// A ticker that is missing or unreadable is skipped with a warning; the
/// remaining tickers continue to load.
pub fn load_tickers(data_dir: &Path, tickers: &[String]) -> Vec<TickerSeries> {
    let mut loaded = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let path = data_dir.join(format!("{ticker}.csv"));
        if !path.exists() {
            warn!(%ticker, path = %path.display(), "ticker file missing, skipping");
            continue;
        }
        match TickerSeries::load_csv(ticker, &path) {
            Ok(series) => {
                info!(%ticker, rows = series.rows.len(), "loaded ticker series");
                loaded.push(series);
            }
            Err(error) => {
                warn!(%ticker, %error, "failed to load ticker, skipping");
            }
        }
    }
    loaded
}

/// The backward shifts applied to each day when building its feature row.
///
/// The grid spans `-max_shift` up to (not including) `-min_shift` in steps of
/// `max_shift / increment`, plus the unshifted day itself.
#[derive(Debug, Clone)]
pub struct ShiftGrid {
    shifts: Vec<isize>,
}

impl ShiftGrid {
    pub fn new(min_shift: usize, max_shift: usize, increment: usize) -> Self {
        let step = (max_shift / increment).max(1) as isize;
        let mut shifts = Vec::new();
        let mut shift = -(max_shift as isize);
        while shift < -(min_shift as isize) {
            shifts.push(shift);
            shift += step;
        }
        shifts.push(0);
        Self { shifts }
    }

    pub fn shift_dim(&self) -> usize {
        self.shifts.len()
    }

    /// Largest look-back, i.e. the first day index that has full history.
    pub fn max_back(&self) -> usize {
        self.shifts
            .iter()
            .map(|&s| (-s).max(0) as usize)
            .max()
            .unwrap_or(0)
    }

    pub fn shifts(&self) -> &[isize] {
        &self.shifts
    }
}

/// One split of assembled training data.
///
/// `features` is `(samples, ticker_dim * shift_dim * data_point_dim *
/// transform_dim)`, `targets` and `outcomes` are `(samples, ticker_dim)`
/// and stay row-aligned with it.
#[derive(Debug, Clone)]
pub struct SupervisedDataset {
    pub features: Array2<f64>,
    pub targets: Array2<f64>,
    pub outcomes: Array2<f64>,
}

impl SupervisedDataset {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_dim(&self) -> usize {
        self.features.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.targets.ncols()
    }

    /// Assemble sequential mini-batches on the given device. The last batch
    /// may be short.
    pub fn batches<B: Backend>(&self, batch_size: usize, device: &B::Device) -> Vec<FeatureBatch<B>> {
        let mut batches = Vec::new();
        let mut start = 0;
        while start < self.len() {
            let end = (start + batch_size).min(self.len());
            batches.push(self.batch_range::<B>(start, end, device));
            start = end;
        }
        batches
    }

    fn batch_range<B: Backend>(&self, start: usize, end: usize, device: &B::Device) -> FeatureBatch<B> {
        let rows = end - start;
        let feature_values: Vec<f32> = self
            .features
            .slice(ndarray::s![start..end, ..])
            .iter()
            .map(|&v| v as f32)
            .collect();
        let target_values: Vec<f32> = self
            .targets
            .slice(ndarray::s![start..end, ..])
            .iter()
            .map(|&v| v as f32)
            .collect();
        let outcomes: Vec<f64> = self
            .outcomes
            .slice(ndarray::s![start..end, ..])
            .iter()
            .cloned()
            .collect();

        FeatureBatch {
            features: Tensor::<B, 1>::from_floats(feature_values.as_slice(), device)
                .reshape([rows, self.feature_dim()]),
            targets: Tensor::<B, 1>::from_floats(target_values.as_slice(), device)
                .reshape([rows, self.output_dim()]),
            outcomes,
        }
    }
}

/// One mini-batch ready for the model.
#[derive(Debug, Clone)]
pub struct FeatureBatch<B: Backend> {
    pub features: Tensor<B, 2>,
    pub targets: Tensor<B, 2>,
    /// Raw forward returns, row-major, aligned with `targets`.
    pub outcomes: Vec<f64>,
}

/// Binary label for a forward return: `>= threshold` for non-negative
/// thresholds, `< threshold` for negative ones.
pub fn binary_target(outcome: f64, threshold: f64) -> f64 {
    let hit = if threshold >= 0.0 {
        outcome >= threshold
    } else {
        outcome < threshold
    };
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Geometry and thresholds for dataset assembly.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub data_point_dim: usize,
    pub grid: ShiftGrid,
    /// Days ahead used for the forward return.
    pub horizon: usize,
    pub threshold: f64,
    pub train_fraction: f64,
}

/// Train and test splits plus the dims the model needs.
#[derive(Debug, Clone)]
pub struct DatasetBundle {
    pub train: SupervisedDataset,
    pub test: SupervisedDataset,
    pub ticker_dim: usize,
    pub feature_dim: usize,
}

/// Build aligned train/test datasets from loaded ticker series.
///
/// All tickers are truncated to their common trailing span so every sample
/// row covers the same day across tickers. The scaler union is fitted on the
/// training rows only and applied to both splits.
pub fn build_datasets(
    series: &[TickerSeries],
    config: &DatasetConfig,
) -> Result<DatasetBundle, DataError> {
    if series.is_empty() {
        return Err(DataError::NoTickers);
    }

    let max_back = config.grid.max_back();
    let needed = max_back + config.horizon + 2;
    for ticker in series {
        if ticker.rows.len() < needed {
            return Err(DataError::TooShort {
                ticker: ticker.ticker.clone(),
                rows: ticker.rows.len(),
                needed,
            });
        }
    }

    let usable = series
        .iter()
        .map(|t| t.rows.len() - max_back - config.horizon)
        .min()
        .unwrap_or(0);

    let ticker_dim = series.len();
    let raw_width = ticker_dim * config.grid.shift_dim() * config.data_point_dim;
    let mut raw = Array2::zeros((usable, raw_width));
    let mut outcomes = Array2::zeros((usable, ticker_dim));

    for (sample, mut row) in raw.rows_mut().into_iter().enumerate() {
        let mut column = 0;
        for (k, ticker) in series.iter().enumerate() {
            // trailing alignment: the most recent `usable` days of each ticker
            let day = ticker.rows.len() - config.horizon - usable + sample;
            for &shift in config.grid.shifts() {
                let index = (day as isize + shift) as usize;
                for value in ticker.rows[index].data_points(config.data_point_dim) {
                    row[column] = value;
                    column += 1;
                }
            }

            let now = ticker.rows[day].close;
            let later = ticker.rows[day + config.horizon].close;
            outcomes[[sample, k]] = later / now - 1.0;
        }
    }

    let train_rows = ((usable as f64) * config.train_fraction) as usize;
    let train_rows = train_rows.clamp(1, usable.saturating_sub(1).max(1));

    let raw_train = raw.slice(ndarray::s![..train_rows, ..]).to_owned();
    let raw_test = raw.slice(ndarray::s![train_rows.., ..]).to_owned();
    let union = ScalerUnion::fit(&raw_train);

    let split = |raw_part: Array2<f64>, outcome_part: Array2<f64>| {
        let targets = outcome_part.mapv(|o| binary_target(o, config.threshold));
        SupervisedDataset {
            features: union.transform(&raw_part),
            targets,
            outcomes: outcome_part,
        }
    };

    let train = split(
        raw_train,
        outcomes.slice(ndarray::s![..train_rows, ..]).to_owned(),
    );
    let test = split(
        raw_test,
        outcomes.slice(ndarray::s![train_rows.., ..]).to_owned(),
    );

    let feature_dim = train.feature_dim();
    Ok(DatasetBundle {
        train,
        test,
        ticker_dim,
        feature_dim,
    })
}

/// Generate a geometric random walk series per ticker, for demo runs and
/// tests.
pub fn generate_synthetic(tickers: &[String], days: usize, seed: u64) -> Vec<TickerSeries> {
    let mut rng = StdRng::seed_from_u64(seed);
    // constant parameters, construction cannot fail
    let returns = match Normal::new(0.0005, 0.02) {
        Ok(distribution) => distribution,
        Err(_) => return Vec::new(),
    };

    tickers
        .iter()
        .map(|ticker| {
            let mut close: f64 = 100.0 * (1.0 + rng.gen_range(-0.5..0.5));
            let rows = (0..days)
                .map(|day| {
                    let open = close;
                    close *= 1.0 + returns.sample(&mut rng);
                    let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
                    let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
                    let volume = rng.gen_range(1.0e5..1.0e7);
                    OhlcvRow {
                        date: format!("day-{day}"),
                        open,
                        high,
                        low,
                        close,
                        volume,
                    }
                })
                .collect();
            TickerSeries {
                ticker: ticker.clone(),
                rows,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn dataset_config() -> DatasetConfig {
        DatasetConfig {
            data_point_dim: 5,
            grid: ShiftGrid::new(3, 10, 3),
            horizon: 3,
            threshold: 0.02,
            train_fraction: 0.8,
        }
    }

    #[test]
    fn test_shift_grid_dims() {
        // -10, -7, -4 plus the unshifted day
        let grid = ShiftGrid::new(3, 10, 3);
        assert_eq!(grid.shifts(), &[-10, -7, -4, 0]);
        assert_eq!(grid.shift_dim(), 4);
        assert_eq!(grid.max_back(), 10);
    }

    #[test]
    fn test_binary_target_threshold_sides() {
        assert_eq!(binary_target(0.03, 0.02), 1.0);
        assert_eq!(binary_target(0.02, 0.02), 1.0);
        assert_eq!(binary_target(0.01, 0.02), 0.0);

        // negative threshold flips the comparison
        assert_eq!(binary_target(-0.05, -0.02), 1.0);
        assert_eq!(binary_target(0.01, -0.02), 0.0);
    }

    #[test]
    fn test_build_datasets_shapes() {
        let config = dataset_config();
        let series = generate_synthetic(&tickers(&["AAA", "BBB"]), 120, 7);
        let bundle = build_datasets(&series, &config).unwrap();

        let expected_width = 2 * 4 * 5 * ScalerUnion::TRANSFORM_COUNT;
        assert_eq!(bundle.ticker_dim, 2);
        assert_eq!(bundle.feature_dim, expected_width);
        assert_eq!(bundle.train.feature_dim(), expected_width);
        assert_eq!(bundle.train.output_dim(), 2);

        let usable = 120 - 10 - 3;
        assert_eq!(bundle.train.len() + bundle.test.len(), usable);
        assert!(bundle.train.len() > bundle.test.len());

        // targets are consistent with outcomes
        for (target, outcome) in bundle.train.targets.iter().zip(bundle.train.outcomes.iter()) {
            assert_eq!(*target, binary_target(*outcome, config.threshold));
        }
    }

    #[test]
    fn test_build_datasets_rejects_short_series() {
        let config = dataset_config();
        let series = generate_synthetic(&tickers(&["AAA"]), 12, 1);
        assert!(matches!(
            build_datasets(&series, &config),
            Err(DataError::TooShort { .. })
        ));

        assert!(matches!(
            build_datasets(&[], &config),
            Err(DataError::NoTickers)
        ));
    }

    #[test]
    fn test_batches_cover_all_rows() {
        let device = Default::default();
        let series = generate_synthetic(&tickers(&["AAA"]), 80, 3);
        let bundle = build_datasets(&series, &dataset_config()).unwrap();

        let batches = bundle.train.batches::<TestBackend>(16, &device);
        let total: usize = batches.iter().map(|b| b.features.dims()[0]).sum();
        assert_eq!(total, bundle.train.len());

        for batch in &batches {
            let rows = batch.features.dims()[0];
            assert_eq!(batch.features.dims()[1], bundle.feature_dim);
            assert_eq!(batch.targets.dims(), [rows, 1]);
            assert_eq!(batch.outcomes.len(), rows);
        }
    }

    #[test]
    fn test_synthetic_series_are_reproducible() {
        let first = generate_synthetic(&tickers(&["AAA"]), 30, 42);
        let second = generate_synthetic(&tickers(&["AAA"]), 30, 42);
        assert_eq!(first[0].rows[10].close, second[0].rows[10].close);
        assert!(first[0].rows.iter().all(|r| r.low <= r.high));
    }
}
