use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{Record, RiskAssessment, RiskLevel};
use super::explain::{explain, Explanation};
use super::model::{ModelError, TrainedModel};
use super::rules::RuleScorer;
use super::storage::KeyValueStore;

const HIGH_RISK_ABOVE: f64 = 0.7;
const MEDIUM_RISK_ABOVE: f64 = 0.4;

/// Session-wide holder of the current model.
///
/// Readers take a cheap snapshot under a short read lock; a retrain replaces
/// the whole model under the write lock only after it is persisted, so a
/// prediction sees either the previous model or the new one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct ModelSlot {
    inner: Arc<RwLock<Option<Arc<TrainedModel>>>>,
}

impl ModelSlot {
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn publish(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(model.clone());
        model
    }

    /// Installs `model` unless another one was published in the meantime.
    fn publish_if_empty(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                let model = Arc::new(model);
                *slot = Some(model.clone());
                model
            }
        }
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Why a prediction was served by the rule-based fallback.
#[derive(Debug, thiserror::Error)]
pub enum ModelUnavailable {
    #[error("no trained model is available yet")]
    NotTrained,
    #[error("stored model could not be loaded: {0}")]
    Load(#[source] ModelError),
    #[error("model inference failed: {0}")]
    Inference(#[source] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Model,
    Rules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub assessment: RiskAssessment,
    pub source: PredictionSource,
    pub explanation: Explanation,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_points: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Map a model probability onto the assessment shape.
pub fn assess_probability(probability: f64) -> RiskAssessment {
    let risk_level = if probability > HIGH_RISK_ABOVE {
        RiskLevel::Alto
    } else if probability > MEDIUM_RISK_ABOVE {
        RiskLevel::Medio
    } else {
        RiskLevel::Baixo
    };
    RiskAssessment {
        risk_score: probability,
        risk_level,
        probability: probability * 100.0,
        is_good_risk: probability < 0.5,
    }
}

/// Serves predictions from the trained model, falling back to [`RuleScorer`].
pub struct PredictionService<S> {
    store: Arc<S>,
    slot: ModelSlot,
    rules: RuleScorer,
}

impl<S> PredictionService<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>, slot: ModelSlot) -> Self {
        Self {
            store,
            slot,
            rules: RuleScorer::new(),
        }
    }

    /// Never fails: any model problem is logged and answered by the rules.
    pub fn predict(&self, record: &Record) -> Prediction {
        match self.model_assessment(record) {
            Ok(assessment) => Prediction {
                recommendation: assessment.risk_level.recommendation().to_string(),
                assessment,
                source: PredictionSource::Model,
                explanation: explain(record),
                rule_points: None,
                note: None,
            },
            Err(reason) => {
                match &reason {
                    ModelUnavailable::NotTrained => {
                        info!("no trained model; using rule-based scoring")
                    }
                    other => warn!(error = %other, "model path failed; using rule-based scoring"),
                }
                self.rule_prediction(record, Some(reason.to_string()))
            }
        }
    }

    /// Rule-based prediction regardless of model availability.
    pub fn predict_with_rules(&self, record: &Record) -> Prediction {
        self.rule_prediction(record, None)
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    fn rule_prediction(&self, record: &Record, note: Option<String>) -> Prediction {
        let score = self.rules.score(record);
        Prediction {
            recommendation: score.assessment.risk_level.recommendation().to_string(),
            assessment: score.assessment,
            source: PredictionSource::Rules,
            explanation: explain(record),
            rule_points: Some(score.points),
            note,
        }
    }

    fn model_assessment(&self, record: &Record) -> Result<RiskAssessment, ModelUnavailable> {
        let model = self.available_model()?;
        let probability = model
            .predict_record(record)
            .map_err(ModelUnavailable::Inference)?;
        Ok(assess_probability(probability))
    }

    fn available_model(&self) -> Result<Arc<TrainedModel>, ModelUnavailable> {
        if let Some(model) = self.slot.current() {
            return Ok(model);
        }
        match TrainedModel::load(self.store.as_ref()) {
            Ok(Some(model)) => {
                info!("loaded persisted model");
                Ok(self.slot.publish_if_empty(model))
            }
            Ok(None) => Err(ModelUnavailable::NotTrained),
            Err(err) => Err(ModelUnavailable::Load(err)),
        }
    }
}
