use std::ops::ControlFlow;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::risk::encoding::{EncodedBatch, FeatureVector, FEATURE_COUNT};
use crate::risk::model::{ModelError, TrainedModel};
use crate::risk::network::{
    binary_cross_entropy, predicted_label, Activation, EpochReport, FitOptions, NoProgress,
    RiskNetwork, DECISION_THRESHOLD,
};
use crate::risk::scaler::ScalerState;

fn separable_batch(rows: usize) -> EncodedBatch {
    let mut batch = EncodedBatch::default();
    for i in 0..rows {
        let positive = i % 2 == 0;
        let signal = if positive { 1.5 } else { -1.5 };
        batch.features.push(FeatureVector([signal; FEATURE_COUNT]));
        batch.labels.push(if positive { 1.0 } else { 0.0 });
    }
    batch
}

fn options(epochs: usize) -> FitOptions {
    FitOptions {
        epochs,
        batch_size: 8,
        shuffle: true,
    }
}

#[test]
fn builds_fixed_topology() {
    let mut rng = StdRng::seed_from_u64(1);
    let network = RiskNetwork::build(&mut rng);

    assert_eq!(network.input_size(), FEATURE_COUNT);
    assert_eq!(network.output_size(), 1);
    assert_eq!(network.layers.len(), 3);
    assert_eq!(network.parameter_count(), 9 * 32 + 32 + 32 * 16 + 16 + 16 + 1);
    network.validate().expect("fresh network is valid");
}

#[test]
fn probabilities_stay_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(2);
    let network = RiskNetwork::build(&mut rng);

    let probabilities = network.predict(&separable_batch(10).features);

    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn inference_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(3);
    let network = RiskNetwork::build(&mut rng);
    let row = [0.3; FEATURE_COUNT];

    assert_eq!(network.forward(&row), network.forward(&row));
}

#[test]
fn fit_reports_every_epoch() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut network = RiskNetwork::build(&mut rng);
    let train = separable_batch(40);
    let validation = separable_batch(10);
    let mut seen = Vec::new();
    let mut observer = |report: &EpochReport| {
        seen.push(report.epoch);
        ControlFlow::Continue(())
    };

    let history = network
        .fit(&train, &validation, &options(5), &mut rng, &mut observer)
        .expect("fit succeeds");

    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(history.epochs.len(), 5);
    assert!(!history.stopped_early);
    let last = history.last().expect("has epochs");
    assert!(last.loss.is_finite());
    assert!(last.val_accuracy.is_some());
}

#[test]
fn training_lowers_loss_on_separable_data() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut network = RiskNetwork::build(&mut rng);
    let train = separable_batch(64);

    let history = network
        .fit(&train, &EncodedBatch::default(), &options(40), &mut rng, &mut NoProgress)
        .expect("fit succeeds");

    let first = history.epochs[0].loss;
    let last = history.last().expect("has epochs").loss;
    assert!(last < first, "loss went from {first} to {last}");
    assert!(history.last().and_then(|r| r.val_loss).is_none());
}

#[test]
fn observer_break_stops_after_current_epoch() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut network = RiskNetwork::build(&mut rng);
    let mut observer = |report: &EpochReport| {
        if report.epoch == 1 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };

    let history = network
        .fit(&separable_batch(16), &separable_batch(4), &options(10), &mut rng, &mut observer)
        .expect("fit returns history");

    assert!(history.stopped_early);
    assert_eq!(history.epochs.len(), 2);
}

#[test]
fn non_finite_inputs_abort_fit() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut network = RiskNetwork::build(&mut rng);
    let mut train = separable_batch(8);
    train.features[0] = FeatureVector([f64::NAN; FEATURE_COUNT]);

    match network.fit(&train, &EncodedBatch::default(), &options(3), &mut rng, &mut NoProgress) {
        Err(ModelError::NonFinite { epoch: Some(0) }) => {}
        other => panic!("expected non-finite error, got {other:?}"),
    }
}

#[test]
fn relu_keeps_nan_visible() {
    assert!(Activation::Relu.apply(f64::NAN).is_nan());
    assert_eq!(Activation::Relu.apply(-2.0), 0.0);
    assert_eq!(Activation::Relu.apply(1.5), 1.5);
}

#[test]
fn nan_weight_in_first_layer_reaches_the_output() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut network = RiskNetwork::build(&mut rng);
    network.layers[0].weights[0][0] = f64::NAN;

    assert!(network.forward(&[1.0; FEATURE_COUNT]).is_nan());
    assert!(network.forward(&[-1.0; FEATURE_COUNT]).is_nan());
}

#[test]
fn nan_weights_fail_fit_in_first_epoch() {
    let mut rng = StdRng::seed_from_u64(10);
    let mut network = RiskNetwork::build(&mut rng);
    network.layers[0].bias[3] = f64::NAN;

    match network.fit(&separable_batch(8), &EncodedBatch::default(), &options(3), &mut rng, &mut NoProgress) {
        Err(ModelError::NonFinite { epoch: Some(0) }) => {}
        other => panic!("expected non-finite error, got {other:?}"),
    }
}

#[test]
fn non_finite_model_is_never_serialised() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut network = RiskNetwork::build(&mut rng);
    network.layers[1].weights[0][0] = f64::NAN;
    let scaler = ScalerState::from_matrix(&separable_batch(4).features).expect("fits");
    let model = TrainedModel::new(network, scaler);

    match model.to_bytes() {
        Err(ModelError::NonFinite { epoch: None }) => {}
        other => panic!("expected non-finite error, got {other:?}"),
    }
}

#[test]
fn validate_rejects_wrong_input_width() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut network = RiskNetwork::build(&mut rng);
    for row in &mut network.layers[0].weights {
        row.pop();
    }

    match network.validate() {
        Err(ModelError::Shape(_)) => {}
        other => panic!("expected shape error, got {other:?}"),
    }
}

#[test]
fn cross_entropy_is_clamped() {
    assert!(binary_cross_entropy(0.0, 1.0).is_finite());
    assert!(binary_cross_entropy(1.0, 0.0).is_finite());
    assert!(binary_cross_entropy(0.9, 1.0) < binary_cross_entropy(0.1, 1.0));
    assert_eq!(predicted_label(DECISION_THRESHOLD, DECISION_THRESHOLD), 1.0);
    assert_eq!(predicted_label(0.49, DECISION_THRESHOLD), 0.0);
}
