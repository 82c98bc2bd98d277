//! Classification metrics
//!
//! All metrics run over plain `f64` slices extracted from the evaluation
//! tensors, so they are backend-independent and trivially testable.
//! Predictions are probabilities in `[0, 1]`; targets are `0.0`/`1.0`.

/// Hard label from a probability: strictly greater than 0.5.
pub fn hard_label(probability: f64) -> bool {
    probability > 0.5
}

/// 2×2 confusion matrix, sklearn layout: rows are true labels, columns are
/// predicted labels, negatives first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_probabilities(predictions: &[f64], targets: &[f64]) -> Self {
        let mut matrix = Self::default();
        for (&pred, &target) in predictions.iter().zip(targets) {
            match (hard_label(pred), target > 0.5) {
                (false, false) => matrix.true_negative += 1,
                (true, false) => matrix.false_positive += 1,
                (false, true) => matrix.false_negative += 1,
                (true, true) => matrix.true_positive += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.true_negative + self.true_positive) as f64 / self.total() as f64
    }

    pub fn precision(&self) -> f64 {
        let predicted_positive = self.true_positive + self.false_positive;
        if predicted_positive == 0 {
            return 0.0;
        }
        self.true_positive as f64 / predicted_positive as f64
    }

    pub fn recall(&self) -> f64 {
        let actual_positive = self.true_positive + self.false_negative;
        if actual_positive == 0 {
            return 0.0;
        }
        self.true_positive as f64 / actual_positive as f64
    }

    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / (precision + recall)
    }

    /// Row-major flattening `[tn, fp, fn, tp]`, the order used in the stat
    /// log lines.
    pub fn ravel(&self) -> [usize; 4] {
        [
            self.true_negative,
            self.false_positive,
            self.false_negative,
            self.true_positive,
        ]
    }
}

/// Mean binary cross entropy over probabilities, with each log term clamped
/// at -100 so degenerate predictions stay finite.
pub fn binary_cross_entropy(predictions: &[f64], targets: &[f64]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sum: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(&pred, &target)| {
            let log_p = pred.ln().max(-100.0);
            let log_not_p = (1.0 - pred).ln().max(-100.0);
            -(target * log_p + (1.0 - target) * log_not_p)
        })
        .sum();
    sum / predictions.len() as f64
}

/// ROC-AUC by the rank-sum (Mann-Whitney) method with tie-averaged ranks.
///
/// Returns `None` when only one class is present, where the score is
/// undefined.
pub fn roc_auc(predictions: &[f64], targets: &[f64]) -> Option<f64> {
    let positives = targets.iter().filter(|&&t| t > 0.5).count();
    let negatives = targets.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|&a, &b| {
        predictions[a]
            .partial_cmp(&predictions[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // tie groups share the average of the ranks they span
    let mut ranks = vec![0.0f64; predictions.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && predictions[order[j + 1]] == predictions[order[i]] {
            j += 1;
        }
        let average_rank = (i + j + 2) as f64 / 2.0;
        for &index in &order[i..=j] {
            ranks[index] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = targets
        .iter()
        .zip(&ranks)
        .filter(|(&target, _)| target > 0.5)
        .map(|(_, &rank)| rank)
        .sum();

    let u = positive_rank_sum - (positives * (positives + 1)) as f64 / 2.0;
    Some(u / (positives * negatives) as f64)
}

/// Mean and standard deviation of `prediction * outcome` over the samples
/// whose prediction clears `threshold`.
///
/// `outcomes` are the raw forward returns, not the binary targets. An empty
/// selection yields the `(0.0, -1.0)` sentinel; a single-element selection
/// has an undefined sample std and yields NaN for it.
pub fn positive_statistics(
    predictions: &[f64],
    outcomes: &[f64],
    threshold: f64,
) -> (f64, f64) {
    let selected: Vec<f64> = predictions
        .iter()
        .zip(outcomes)
        .filter(|(&pred, _)| pred >= threshold)
        .map(|(&pred, &outcome)| pred * outcome)
        .collect();

    if selected.is_empty() {
        return (0.0, -1.0);
    }

    let n = selected.len() as f64;
    let mean = selected.iter().sum::<f64>() / n;
    let variance = selected.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Full metric set computed over one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub accuracy: f64,
    pub bce: f64,
    pub f1_score: f64,
    pub roc_auc: Option<f64>,
    pub precision: f64,
    pub recall: f64,
    pub confusion: ConfusionMatrix,
    pub positive_mean: f64,
    pub positive_std: f64,
}

impl EpochMetrics {
    /// Compute every metric from flattened predictions, binary targets and
    /// raw outcomes. The three slices are index-aligned.
    pub fn compute(
        predictions: &[f64],
        targets: &[f64],
        outcomes: &[f64],
        positive_threshold: f64,
    ) -> Self {
        let confusion = ConfusionMatrix::from_probabilities(predictions, targets);
        let (positive_mean, positive_std) =
            positive_statistics(predictions, outcomes, positive_threshold);
        Self {
            accuracy: confusion.accuracy(),
            bce: binary_cross_entropy(predictions, targets),
            f1_score: confusion.f1_score(),
            roc_auc: roc_auc(predictions, targets),
            precision: confusion.precision(),
            recall: confusion.recall(),
            confusion,
            positive_mean,
            positive_std,
        }
    }
}

/// Accumulates flattened predictions, targets and raw outcomes across the
/// batches of one evaluation pass.
#[derive(Debug, Default)]
pub struct EpochRecorder {
    predictions: Vec<f64>,
    targets: Vec<f64>,
    outcomes: Vec<f64>,
}

impl EpochRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, predictions: &[f64], targets: &[f64], outcomes: &[f64]) {
        self.predictions.extend_from_slice(predictions);
        self.targets.extend_from_slice(targets);
        self.outcomes.extend_from_slice(outcomes);
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn finish(self, positive_threshold: f64) -> EpochMetrics {
        EpochMetrics::compute(
            &self.predictions,
            &self.targets,
            &self.outcomes,
            positive_threshold,
        )
    }
}
