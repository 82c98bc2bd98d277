//! Run logging sink
//!
//! Mirrors the original run logs: human-readable metric lines through
//! `tracing`, plus a machine-readable stat file with one CSV line per
//! evaluation (`epoch,split,positive_mean,positive_std,[tn, fp, fn, tp]`).
//! A failed file write is a warning; the run keeps going.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::trainer::{EpochObserver, EpochReport};

/// File-backed observer writing the stat CSV lines of a run.
#[derive(Debug)]
pub struct RunLogger {
    stat_path: PathBuf,
}

impl RunLogger {
    /// Create the log directory and a run-stamped stat file name.
    pub fn create(log_dir: &Path, threshold: f64) -> std::io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let stat_path = log_dir.join(format!("training_bce_{stamp}_stat_{threshold}.log"));
        Ok(Self { stat_path })
    }

    pub fn stat_path(&self) -> &Path {
        &self.stat_path
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.stat_path)?;
        writeln!(file, "{line}")
    }
}

impl EpochObserver for RunLogger {
    fn on_report(&mut self, report: &EpochReport) {
        let metrics = &report.metrics;
        info!(
            "{} results - epoch: {} accuracy: {:.5}, bce: {:.5}, f1: {:.5}, roc_auc: {:.5}",
            report.split.as_str(),
            report.epoch,
            metrics.accuracy,
            metrics.bce,
            metrics.f1_score,
            metrics.roc_auc.unwrap_or(f64::NAN),
        );
        info!(
            "{} results - epoch: {} precision: {:.5}, recall: {:.5}, positive stat: {:.5}, {:.5}",
            report.split.as_str(),
            report.epoch,
            metrics.precision,
            metrics.recall,
            metrics.positive_mean,
            metrics.positive_std,
        );
        info!(
            "{} results - epoch: {} confusion matrix: {:?}",
            report.split.as_str(),
            report.epoch,
            metrics.confusion.ravel(),
        );

        let line = format!(
            "{},{},{:.5},{:.5},{:?}",
            report.epoch,
            report.split.as_str(),
            metrics.positive_mean,
            metrics.positive_std,
            metrics.confusion.ravel(),
        );
        if let Err(error) = self.append_line(&line) {
            warn!(%error, path = %self.stat_path.display(), "failed to write stat line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::EpochMetrics;
    use crate::training::trainer::Split;

    #[test]
    fn test_stat_lines_accumulate() {
        let dir = std::env::temp_dir().join(format!("run_logger_test_{}", std::process::id()));
        let mut logger = RunLogger::create(&dir, 0.02).unwrap();

        let metrics = EpochMetrics::compute(
            &[0.9, 0.1, 0.8],
            &[1.0, 0.0, 0.0],
            &[0.03, -0.01, 0.02],
            0.5,
        );
        for epoch in [50, 100] {
            logger.on_report(&EpochReport {
                epoch,
                split: Split::Train,
                metrics: metrics.clone(),
            });
        }

        let contents = fs::read_to_string(logger.stat_path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("50,train,"));
        assert!(lines[1].starts_with("100,train,"));
        // ravel order is tn, fp, fn, tp
        assert!(lines[0].ends_with("[1, 1, 0, 1]"));

        fs::remove_dir_all(&dir).ok();
    }
}
