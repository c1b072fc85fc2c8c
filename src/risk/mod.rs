//! Credit-risk pipeline: encode applicant records, scale them, train a small
//! binary classifier for "high risk", and serve predictions with a rule-based
//! fallback when no model is available.

pub mod dataset;
pub mod domain;
pub mod encoding;
pub mod explain;
pub mod metrics;
pub mod model;
pub mod network;
pub mod prediction;
pub mod rules;
pub mod scaler;
pub mod session;
pub mod storage;
pub mod training;

#[cfg(test)]
mod tests;

pub use dataset::{
    heuristic_label, import_german_csv, load_json, load_path, synthetic_records, write_json,
    DatasetError, DatasetSummary, LevelSummary,
};
pub use domain::{Checking, Housing, Purpose, Record, RiskAssessment, RiskLevel, Savings, Sex};
pub use encoding::{encode, encode_batch, EncodedBatch, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use explain::{explain, Explanation};
pub use metrics::{ConfusionCounts, MetricsError, MetricsSnapshot};
pub use model::{ModelError, TrainedModel};
pub use network::{EpochReport, FitOptions, NoProgress, ProgressObserver, RiskNetwork, TrainingHistory};
pub use prediction::{
    assess_probability, ModelSlot, ModelUnavailable, Prediction, PredictionService,
    PredictionSource,
};
pub use rules::{RiskFactor, RuleScore, RuleScorer, ScoreComponent};
pub use scaler::{Scaler, ScalerError, ScalerState, StateError};
pub use session::RiskSession;
pub use storage::{DirectoryStore, KeyValueStore, MemoryStore, StorageError, METRICS_KEY, MODEL_KEY};
pub use training::{
    split_index, ScalerFit, TrainingConfig, TrainingError, TrainingOrchestrator, TrainingRun,
    TRAIN_FRACTION,
};
