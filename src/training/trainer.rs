//! Training loop driver
//!
//! A fixed-epoch loop: forward, BCE loss, backward, Adam step over the
//! training batches, and every `print_every` epochs a full no-gradient
//! evaluation over both splits. Evaluation reports are handed to an ordered
//! list of observers; the logging sink is one of them.

use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use tracing::{debug, info};

use crate::data::SupervisedDataset;
use crate::metrics::{EpochMetrics, EpochRecorder};
use crate::model::ProbabilityModel;

use super::loss::binary_cross_entropy;

/// Loop hyperparameters.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub max_epoch: usize,
    pub print_every: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Prediction cutoff for the positive statistic.
    pub positive_threshold: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_epoch: 600,
            print_every: 50,
            batch_size: 64,
            learning_rate: 0.01,
            weight_decay: 1e-6,
            positive_threshold: 0.5,
        }
    }
}

/// Which split an evaluation ran over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// One evaluation result delivered to the observers.
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub epoch: usize,
    pub split: Split,
    pub metrics: EpochMetrics,
}

/// Post-evaluation hook. Observers run in the order they were registered.
pub trait EpochObserver {
    fn on_report(&mut self, report: &EpochReport);
}

/// Everything the loop accumulated over a run.
#[derive(Debug, Clone, Default)]
pub struct TrainHistory {
    /// Mean training loss per epoch, in order.
    pub train_losses: Vec<f64>,
    /// Evaluation reports, in delivery order.
    pub reports: Vec<EpochReport>,
}

/// Fixed-epoch training driver. Consumes the model for the duration of the
/// run and returns it together with the history; everything else owned by
/// the run is dropped at scope end.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainConfig,
    device: B::Device,
    observers: Vec<Box<dyn EpochObserver>>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainConfig, device: B::Device) -> Self {
        Self {
            config,
            device,
            observers: Vec::new(),
        }
    }

    /// Append an observer; delivery order follows registration order.
    pub fn with_observer(mut self, observer: Box<dyn EpochObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn run<M>(
        mut self,
        mut model: M,
        train: &SupervisedDataset,
        test: &SupervisedDataset,
    ) -> (M, TrainHistory)
    where
        M: ProbabilityModel<B> + AutodiffModule<B>,
        M::InnerModule: ProbabilityModel<B::InnerBackend>,
    {
        info!(
            epochs = self.config.max_epoch,
            train_samples = train.len(),
            test_samples = test.len(),
            "starting training"
        );

        let mut optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay as f32)))
            .init();
        let mut history = TrainHistory::default();

        for epoch in 1..=self.config.max_epoch {
            let mut loss_sum = 0.0;
            let mut batch_count = 0usize;

            for batch in train.batches::<B>(self.config.batch_size, &self.device) {
                let predictions = model.forward(batch.features);
                let loss = binary_cross_entropy(predictions, batch.targets);

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optimizer.step(self.config.learning_rate, model, grads);

                loss_sum += loss.into_scalar().elem::<f32>() as f64;
                batch_count += 1;
            }

            let epoch_loss = if batch_count > 0 {
                loss_sum / batch_count as f64
            } else {
                0.0
            };
            history.train_losses.push(epoch_loss);
            debug!(epoch, loss = epoch_loss, "epoch finished");

            if epoch % self.config.print_every == 0 {
                let inner = model.valid();
                for (split, dataset) in [(Split::Train, train), (Split::Test, test)] {
                    let metrics = evaluate(
                        &inner,
                        dataset,
                        self.config.batch_size,
                        self.config.positive_threshold,
                        &self.device,
                    );
                    let report = EpochReport {
                        epoch,
                        split,
                        metrics,
                    };
                    for observer in &mut self.observers {
                        observer.on_report(&report);
                    }
                    history.reports.push(report);
                }
            }
        }

        info!("training finished");
        (model, history)
    }
}

/// One no-gradient evaluation pass over a dataset.
pub fn evaluate<B: Backend, M: ProbabilityModel<B>>(
    model: &M,
    dataset: &SupervisedDataset,
    batch_size: usize,
    positive_threshold: f64,
    device: &B::Device,
) -> EpochMetrics {
    let mut recorder = EpochRecorder::new();

    for batch in dataset.batches::<B>(batch_size, device) {
        let predictions = model.forward(batch.features);
        let predictions: Vec<f64> = predictions
            .into_data()
            .to_vec::<f32>()
            .expect("prediction tensor converts to f32")
            .into_iter()
            .map(f64::from)
            .collect();
        let targets: Vec<f64> = batch
            .targets
            .into_data()
            .to_vec::<f32>()
            .expect("target tensor converts to f32")
            .into_iter()
            .map(f64::from)
            .collect();
        recorder.record(&predictions, &targets, &batch.outcomes);
    }

    recorder.finish(positive_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{build_datasets, generate_synthetic, DatasetConfig, ShiftGrid};
    use crate::model::{ConvNet, NetConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    struct CountingObserver {
        seen: std::rc::Rc<std::cell::RefCell<Vec<(usize, Split)>>>,
    }

    impl EpochObserver for CountingObserver {
        fn on_report(&mut self, report: &EpochReport) {
            self.seen.borrow_mut().push((report.epoch, report.split));
        }
    }

    fn small_run(learning_rate: f64, max_epoch: usize) -> (TrainHistory, usize) {
        let device = Default::default();
        let tickers = vec!["AAA".to_string()];
        let series = generate_synthetic(&tickers, 90, 11);
        let dataset_config = DatasetConfig {
            data_point_dim: 5,
            grid: ShiftGrid::new(3, 10, 3),
            horizon: 3,
            threshold: 0.0,
            train_fraction: 0.8,
        };
        let bundle = build_datasets(&series, &dataset_config).unwrap();

        let net_config = NetConfig {
            ticker_dim: 1,
            data_point_dim: 5,
            shift_dim: 4,
            transform_dim: 4,
            output_dim: 1,
            const_factor: 2,
            block_depth: 1,
            linear_dim: 0,
        };
        let model = ConvNet::<TestBackend>::legacy(&net_config, &device).unwrap();
        assert_eq!(model.seq_len(), bundle.feature_dim);

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let trainer = Trainer::<TestBackend>::new(
            TrainConfig {
                max_epoch,
                print_every: 2,
                batch_size: 16,
                learning_rate,
                weight_decay: 1e-6,
                positive_threshold: 0.5,
            },
            device,
        )
        .with_observer(Box::new(CountingObserver { seen: seen.clone() }));

        let (_model, history) = trainer.run(model, &bundle.train, &bundle.test);
        let observed = seen.borrow().len();
        (history, observed)
    }

    #[test]
    fn test_observers_fire_on_print_every_epochs() {
        let (history, observed) = small_run(0.01, 4);
        assert_eq!(history.train_losses.len(), 4);
        // epochs 2 and 4, train + test each
        assert_eq!(history.reports.len(), 4);
        assert_eq!(observed, 4);
        assert_eq!(history.reports[0].epoch, 2);
        assert_eq!(history.reports[0].split, Split::Train);
        assert_eq!(history.reports[1].split, Split::Test);
    }

    #[test]
    fn test_zero_learning_rate_keeps_loss_fixed() {
        let (history, _) = small_run(0.0, 3);
        let first = history.train_losses[0];
        for &loss in &history.train_losses[1..] {
            assert!((loss - first).abs() < 1e-9);
        }
    }
}
