//! Feature Scaling Union
//!
//! Four scalers fitted on the training frame only and applied to both
//! splits, with their outputs concatenated column-wise. Rows are samples,
//! columns are raw features; the union therefore multiplies the feature
//! width by [`ScalerUnion::TRANSFORM_COUNT`].

use ndarray::{s, Array2, Axis};

/// Per-column min-max scaling to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl MinMaxScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let mut mins = Vec::with_capacity(data.ncols());
        let mut maxs = Vec::with_capacity(data.ncols());
        for column in data.axis_iter(Axis(1)) {
            mins.push(column.iter().cloned().fold(f64::INFINITY, f64::min));
            maxs.push(column.iter().cloned().fold(f64::NEG_INFINITY, f64::max));
        }
        Self { mins, maxs }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut result = data.clone();
        for (j, mut column) in result.axis_iter_mut(Axis(1)).enumerate() {
            let range = self.maxs[j] - self.mins[j];
            if range > 1e-10 {
                column.mapv_inplace(|v| (v - self.mins[j]) / range);
            } else {
                column.fill(0.0);
            }
        }
        result
    }
}

/// Per-column scaling by the maximum absolute value.
#[derive(Debug, Clone)]
pub struct MaxAbsScaler {
    max_abs: Vec<f64>,
}

impl MaxAbsScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let max_abs = data
            .axis_iter(Axis(1))
            .map(|column| column.iter().map(|v| v.abs()).fold(0.0, f64::max))
            .collect();
        Self { max_abs }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut result = data.clone();
        for (j, mut column) in result.axis_iter_mut(Axis(1)).enumerate() {
            if self.max_abs[j] > 1e-10 {
                let scale = self.max_abs[j];
                column.mapv_inplace(|v| v / scale);
            } else {
                column.fill(0.0);
            }
        }
        result
    }
}

/// Per-column map onto the empirical CDF of the training data, giving an
/// approximately uniform distribution on `[0, 1]`.
#[derive(Debug, Clone)]
pub struct QuantileScaler {
    references: Vec<Vec<f64>>,
}

impl QuantileScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let references = data
            .axis_iter(Axis(1))
            .map(|column| {
                let mut sorted: Vec<f64> = column.iter().cloned().collect();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                sorted
            })
            .collect();
        Self { references }
    }

    fn cdf(reference: &[f64], value: f64) -> f64 {
        let n = reference.len();
        if n < 2 {
            return 0.0;
        }
        if value <= reference[0] {
            return 0.0;
        }
        if value >= reference[n - 1] {
            return 1.0;
        }
        // interpolate between the neighboring reference values
        let upper = reference.partition_point(|&r| r < value);
        let lower = upper - 1;
        let low_value = reference[lower];
        let high_value = reference[upper];
        let fraction = if high_value > low_value {
            (value - low_value) / (high_value - low_value)
        } else {
            0.0
        };
        (lower as f64 + fraction) / (n - 1) as f64
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut result = data.clone();
        for (j, mut column) in result.axis_iter_mut(Axis(1)).enumerate() {
            let reference = &self.references[j];
            column.mapv_inplace(|v| Self::cdf(reference, v));
        }
        result
    }
}

/// Row-wise L2 normalization. Stateless; `fit` only exists for symmetry
/// with the other scalers.
#[derive(Debug, Clone, Default)]
pub struct L2Normalizer;

impl L2Normalizer {
    pub fn fit(_data: &Array2<f64>) -> Self {
        Self
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut result = data.clone();
        for mut row in result.axis_iter_mut(Axis(0)) {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 1e-10 {
                row.mapv_inplace(|v| v / norm);
            }
        }
        result
    }
}

/// The fitted union of all four scalers.
///
/// `transform` concatenates the scaled frames horizontally, in fit order:
/// min-max, max-abs, quantile, L2.
#[derive(Debug, Clone)]
pub struct ScalerUnion {
    min_max: MinMaxScaler,
    max_abs: MaxAbsScaler,
    quantile: QuantileScaler,
    l2: L2Normalizer,
}

impl ScalerUnion {
    /// Number of scaled copies the union emits per raw feature column.
    pub const TRANSFORM_COUNT: usize = 4;

    /// Fit every scaler on the training frame.
    pub fn fit(train: &Array2<f64>) -> Self {
        Self {
            min_max: MinMaxScaler::fit(train),
            max_abs: MaxAbsScaler::fit(train),
            quantile: QuantileScaler::fit(train),
            l2: L2Normalizer::fit(train),
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let parts = [
            self.min_max.transform(data),
            self.max_abs.transform(data),
            self.quantile.transform(data),
            self.l2.transform(data),
        ];

        let mut result = Array2::zeros((data.nrows(), data.ncols() * Self::TRANSFORM_COUNT));
        for (k, part) in parts.iter().enumerate() {
            result
                .slice_mut(s![.., k * data.ncols()..(k + 1) * data.ncols()])
                .assign(part);
        }
        result
    }
}
