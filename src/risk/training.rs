use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::Record;
use super::encoding::{encode_batch, EncodedBatch};
use super::metrics::MetricsSnapshot;
use super::model::TrainedModel;
use super::network::{
    mean_binary_cross_entropy, FitOptions, ProgressObserver, RiskNetwork, TrainingHistory,
    DECISION_THRESHOLD,
};
use super::scaler::Scaler;
use super::storage::{KeyValueStore, METRICS_KEY, MODEL_KEY};

pub const TRAIN_FRACTION: f64 = 0.8;

/// Which rows the scaler statistics are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    /// Training split only; test statistics never reach the model.
    #[default]
    TrainSplit,
    /// Every encoded row before splitting. Leaks test statistics into training.
    FullDataset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub fit: FitOptions,
    pub train_fraction: f64,
    pub scaler_fit: ScalerFit,
    /// Seeds weight init, dropout and shuffling; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            fit: FitOptions::default(),
            train_fraction: TRAIN_FRACTION,
            scaler_fit: ScalerFit::default(),
            seed: None,
        }
    }
}

/// Result of a completed run; the model is already persisted.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub metrics: MetricsSnapshot,
    pub history: TrainingHistory,
    pub model: TrainedModel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrainingError {
    #[error("no records to train on; load a dataset first")]
    EmptyDataset,
    #[error("a training run is already in progress")]
    AlreadyRunning,
    #[error("training cancelled after epoch {epoch}")]
    Cancelled { epoch: usize },
    #[error("training failed: {message}")]
    Failed { message: String },
}

impl TrainingError {
    fn failed(cause: impl fmt::Display) -> Self {
        Self::Failed {
            message: cause.to_string(),
        }
    }
}

/// Index where the order-preserving train/test split happens: `floor(fraction * n)`.
pub fn split_index(rows: usize, fraction: f64) -> usize {
    ((rows as f64) * fraction).floor() as usize
}

/// Owns the encode → split → scale → fit → evaluate → persist sequence.
pub struct TrainingOrchestrator<S> {
    store: Arc<S>,
    config: TrainingConfig,
    running: AtomicBool,
}

struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S> TrainingOrchestrator<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>, config: TrainingConfig) -> Self {
        Self {
            store,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Train on `records`, persist the model and metrics, and return both.
    ///
    /// Persisted state from an earlier run is left untouched unless this run
    /// succeeds end to end.
    pub fn run<O>(&self, records: &[Record], observer: &mut O) -> Result<TrainingRun, TrainingError>
    where
        O: ProgressObserver + ?Sized,
    {
        if records.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        let _guard = RunGuard::acquire(&self.running).ok_or(TrainingError::AlreadyRunning)?;

        info!(records = records.len(), "training run started");
        match self.train(records, observer) {
            Ok(run) => {
                info!(
                    accuracy = run.metrics.accuracy,
                    precision = run.metrics.precision,
                    recall = run.metrics.recall,
                    loss = run.metrics.loss,
                    "training run finished"
                );
                Ok(run)
            }
            Err(err) => {
                warn!(error = %err, "training run aborted");
                Err(err)
            }
        }
    }

    fn train<O>(&self, records: &[Record], observer: &mut O) -> Result<TrainingRun, TrainingError>
    where
        O: ProgressObserver + ?Sized,
    {
        let batch = encode_batch(records);
        let (train, test) = batch.split_at(split_index(batch.len(), self.config.train_fraction));
        if train.is_empty() {
            return Err(TrainingError::failed(format!(
                "training split is empty ({} record(s) supplied)",
                records.len()
            )));
        }

        let mut scaler = Scaler::new();
        let scaler_state = match self.config.scaler_fit {
            ScalerFit::TrainSplit => scaler.fit(&train.features),
            ScalerFit::FullDataset => scaler.fit(&batch.features),
        }
        .map_err(TrainingError::failed)?;
        let train = scaled(train, &scaler)?;
        let test = scaled(test, &scaler)?;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut network = RiskNetwork::build(&mut rng);
        let history = network
            .fit(&train, &test, &self.config.fit, &mut rng, observer)
            .map_err(TrainingError::failed)?;
        if history.stopped_early {
            return Err(TrainingError::Cancelled {
                epoch: history.epochs.len(),
            });
        }
        network.validate().map_err(TrainingError::failed)?;

        let probabilities = network.predict(&test.features);
        let confusion = network.evaluate_confusion(&test.features, &test.labels, DECISION_THRESHOLD);
        let loss = mean_binary_cross_entropy(&probabilities, &test.labels);
        if !loss.is_finite() {
            return Err(TrainingError::failed("test loss is not finite"));
        }

        let metrics =
            MetricsSnapshot::from_confusion(confusion, loss, train.len(), test.len(), Utc::now());
        let model = TrainedModel::new(network, scaler_state);
        self.persist(&model, &metrics)?;

        Ok(TrainingRun {
            metrics,
            history,
            model,
        })
    }

    /// Writes the model, then the metrics. Any failure restores both keys.
    fn persist(&self, model: &TrainedModel, metrics: &MetricsSnapshot) -> Result<(), TrainingError> {
        let model_bytes = model.to_bytes().map_err(TrainingError::failed)?;
        let metrics_bytes = metrics.to_json().map_err(TrainingError::failed)?;

        let previous_model = self.store.get(MODEL_KEY).map_err(TrainingError::failed)?;
        let previous_metrics = self.store.get(METRICS_KEY).map_err(TrainingError::failed)?;

        let written = self
            .store
            .set(MODEL_KEY, &model_bytes)
            .and_then(|()| self.store.set(METRICS_KEY, &metrics_bytes));
        if let Err(err) = written {
            warn!(error = %err, "persisting training results failed; restoring previous state");
            self.restore(MODEL_KEY, previous_model);
            self.restore(METRICS_KEY, previous_metrics);
            return Err(TrainingError::failed(err));
        }
        Ok(())
    }

    fn restore(&self, key: &str, previous: Option<Vec<u8>>) {
        let result = match previous {
            Some(bytes) => self.store.set(key, &bytes),
            None => self.store.remove(key),
        };
        if let Err(err) = result {
            error!(key, error = %err, "could not restore previous value");
        }
    }
}

fn scaled(batch: EncodedBatch, scaler: &Scaler) -> Result<EncodedBatch, TrainingError> {
    Ok(EncodedBatch {
        features: scaler.transform(&batch.features).map_err(TrainingError::failed)?,
        labels: batch.labels,
    })
}
