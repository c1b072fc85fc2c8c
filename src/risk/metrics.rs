use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::storage::{KeyValueStore, StorageError, METRICS_KEY};

/// Tallies of thresholded binary predictions against true labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// A probability at or above `threshold` counts as a positive prediction.
    pub fn from_predictions(probabilities: &[f64], labels: &[f64], threshold: f64) -> Self {
        let mut counts = Self::default();
        for (&p, &y) in probabilities.iter().zip(labels) {
            let predicted = p >= threshold;
            let actual = y >= 0.5;
            match (predicted, actual) {
                (true, true) => counts.true_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (true, false) => counts.false_positives += 1,
                (false, true) => counts.false_negatives += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Metrics of the most recent successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub accuracy: f64,
    pub loss: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub train_size: usize,
    pub test_size: usize,
    pub confusion: ConfusionCounts,
    pub timestamp: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn from_confusion(
        confusion: ConfusionCounts,
        loss: f64,
        train_size: usize,
        test_size: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            accuracy: confusion.accuracy(),
            loss,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1_score: confusion.f1_score(),
            train_size,
            test_size,
            confusion,
            timestamp,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, MetricsError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<(), MetricsError> {
        store.set(METRICS_KEY, &self.to_json()?)?;
        Ok(())
    }

    /// `Ok(None)` when no run has stored metrics yet.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Option<Self>, MetricsError> {
        match store.get(METRICS_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("invalid metrics payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
