use std::sync::Arc;

use tracing::info;

use super::domain::Record;
use super::metrics::{MetricsError, MetricsSnapshot};
use super::network::ProgressObserver;
use super::prediction::{ModelSlot, Prediction, PredictionService};
use super::storage::{KeyValueStore, StorageError, METRICS_KEY, MODEL_KEY};
use super::training::{TrainingConfig, TrainingError, TrainingOrchestrator};

/// One store, one model slot, and the services sharing them.
pub struct RiskSession<S> {
    store: Arc<S>,
    slot: ModelSlot,
    orchestrator: TrainingOrchestrator<S>,
    predictions: PredictionService<S>,
}

impl<S> RiskSession<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>, config: TrainingConfig) -> Self {
        let slot = ModelSlot::default();
        Self {
            orchestrator: TrainingOrchestrator::new(store.clone(), config),
            predictions: PredictionService::new(store.clone(), slot.clone()),
            store,
            slot,
        }
    }

    /// Train, persist, then swap the new model in for subsequent predictions.
    pub fn train<O>(&self, records: &[Record], observer: &mut O) -> Result<MetricsSnapshot, TrainingError>
    where
        O: ProgressObserver + ?Sized,
    {
        let run = self.orchestrator.run(records, observer)?;
        self.slot.publish(run.model);
        Ok(run.metrics)
    }

    pub fn predict(&self, record: &Record) -> Prediction {
        self.predictions.predict(record)
    }

    pub fn predict_with_rules(&self, record: &Record) -> Prediction {
        self.predictions.predict_with_rules(record)
    }

    pub fn metrics(&self) -> Result<Option<MetricsSnapshot>, MetricsError> {
        MetricsSnapshot::load(self.store.as_ref())
    }

    /// True when a model is loaded or persisted.
    pub fn has_model(&self) -> Result<bool, StorageError> {
        if self.slot.current().is_some() {
            return Ok(true);
        }
        Ok(self.store.get(MODEL_KEY)?.is_some())
    }

    /// Forget the persisted model and metrics; predictions revert to rules.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.store.remove(MODEL_KEY)?;
        self.store.remove(METRICS_KEY)?;
        self.slot.clear();
        info!("model and metrics cleared");
        Ok(())
    }

    pub fn is_training(&self) -> bool {
        self.orchestrator.is_running()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
