use std::sync::Arc;

use super::common::*;
use crate::risk::dataset::synthetic_records;
use crate::risk::domain::RiskLevel;
use crate::risk::model::TrainedModel;
use crate::risk::network::NoProgress;
use crate::risk::prediction::{assess_probability, ModelSlot, PredictionService, PredictionSource};
use crate::risk::session::RiskSession;
use crate::risk::storage::{KeyValueStore, MODEL_KEY};

#[test]
fn probability_thresholds_are_exclusive() {
    assert_eq!(assess_probability(0.71).risk_level, RiskLevel::Alto);
    assert_eq!(assess_probability(0.7).risk_level, RiskLevel::Medio);
    assert_eq!(assess_probability(0.41).risk_level, RiskLevel::Medio);
    assert_eq!(assess_probability(0.4).risk_level, RiskLevel::Baixo);

    let assessment = assess_probability(0.25);
    assert_eq!(assessment.probability, 25.0);
    assert!(assessment.is_good_risk);
    assert!(!assess_probability(0.5).is_good_risk);
}

#[test]
fn falls_back_to_rules_without_model() {
    let service = PredictionService::new(memory_store(), ModelSlot::default());

    let prediction = service.predict(&young_renter());

    assert_eq!(prediction.source, PredictionSource::Rules);
    assert_eq!(prediction.assessment.risk_level, RiskLevel::Alto);
    assert_eq!(prediction.rule_points, Some(19));
    assert!(prediction.note.is_some());
    assert!(!prediction.explanation.warnings.is_empty());
}

#[test]
fn corrupt_model_falls_back_to_rules() {
    let store = memory_store();
    store.set(MODEL_KEY, b"not a model").expect("seed corrupt blob");
    let service = PredictionService::new(store, ModelSlot::default());

    let prediction = service.predict(&established_owner());

    assert_eq!(prediction.source, PredictionSource::Rules);
    assert_eq!(prediction.assessment.risk_level, RiskLevel::Baixo);
    let note = prediction.note.expect("fallback note");
    assert!(note.contains("could not be loaded"), "note was {note}");
}

#[test]
fn unavailable_store_still_predicts() {
    let service = PredictionService::new(Arc::new(UnavailableStore), ModelSlot::default());

    let prediction = service.predict(&established_owner());

    assert_eq!(prediction.source, PredictionSource::Rules);
}

#[test]
fn trained_session_predicts_with_model() {
    let session = RiskSession::new(memory_store(), fast_config(21));
    session
        .train(&synthetic_records(80, 21), &mut NoProgress)
        .expect("training succeeds");

    let first = session.predict(&young_renter());
    let second = session.predict(&young_renter());

    assert_eq!(first.source, PredictionSource::Model);
    assert!(first.rule_points.is_none());
    assert!((0.0..=1.0).contains(&first.assessment.risk_score));
    assert_eq!(first.assessment.risk_score, second.assessment.risk_score);
    assert_eq!(first.recommendation, first.assessment.risk_level.recommendation());
}

#[test]
fn persisted_model_serves_a_fresh_session() {
    let store = memory_store();
    let trained = RiskSession::new(store.clone(), fast_config(22));
    trained
        .train(&synthetic_records(80, 22), &mut NoProgress)
        .expect("training succeeds");
    let expected = trained.predict(&established_owner());

    let fresh = RiskSession::new(store, fast_config(99));
    let reloaded = fresh.predict(&established_owner());

    assert_eq!(reloaded.source, PredictionSource::Model);
    assert!((reloaded.assessment.risk_score - expected.assessment.risk_score).abs() < 1e-12);
}

#[test]
fn reset_reverts_to_rules() {
    let store = memory_store();
    let session = RiskSession::new(store.clone(), fast_config(23));
    session
        .train(&synthetic_records(40, 23), &mut NoProgress)
        .expect("training succeeds");
    assert!(session.has_model().expect("store readable"));

    session.reset().expect("reset succeeds");

    assert!(!session.has_model().expect("store readable"));
    assert!(session.metrics().expect("metrics readable").is_none());
    assert_eq!(session.predict(&young_renter()).source, PredictionSource::Rules);
    assert!(store.keys().is_empty());
}

#[test]
fn slot_publish_replaces_model() {
    let slot = ModelSlot::default();
    assert!(slot.current().is_none());
    let store = memory_store();
    let session = RiskSession::new(store.clone(), fast_config(24));
    session
        .train(&synthetic_records(30, 24), &mut NoProgress)
        .expect("training succeeds");
    let model = TrainedModel::load(store.as_ref())
        .expect("readable")
        .expect("stored");

    let published = slot.publish(model.clone());

    assert_eq!(*published, model);
    assert!(slot.current().is_some());
    slot.clear();
    assert!(slot.current().is_none());
}
