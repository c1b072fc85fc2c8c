use crate::risk::encoding::{FeatureVector, FEATURE_COUNT};
use crate::risk::scaler::{Scaler, ScalerError, ScalerState, StateError, EPSILON};

fn row(first: f64, second: f64) -> FeatureVector {
    let mut values = [5.0; FEATURE_COUNT];
    values[0] = first;
    values[1] = second;
    FeatureVector(values)
}

#[test]
fn transform_before_fit_is_rejected() {
    let scaler = Scaler::new();

    match scaler.transform(&[row(1.0, 2.0)]) {
        Err(StateError::NotFitted) => {}
        other => panic!("expected NotFitted, got {other:?}"),
    }
    assert!(!scaler.is_fitted());
}

#[test]
fn fit_rejects_empty_matrix() {
    let mut scaler = Scaler::new();

    match scaler.fit(&[]) {
        Err(ScalerError::Empty) => {}
        other => panic!("expected empty matrix error, got {other:?}"),
    }
}

#[test]
fn uses_population_standard_deviation() {
    let state = ScalerState::from_matrix(&[row(2.0, 10.0), row(4.0, 10.0)]).expect("fits");

    assert_eq!(state.mean[0], 3.0);
    assert_eq!(state.std[0], 1.0);
    assert_eq!(state.std[1], 0.0);
}

#[test]
fn fitted_columns_have_zero_mean() {
    let matrix = vec![row(1.0, 100.0), row(2.0, 300.0), row(6.0, 200.0)];
    let mut scaler = Scaler::new();
    scaler.fit(&matrix).expect("fits");

    let scaled = scaler.transform(&matrix).expect("fitted");

    for column in 0..2 {
        let mean: f64 = scaled.iter().map(|r| r.values()[column]).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-9, "column {column} mean was {mean}");
    }
}

#[test]
fn constant_columns_map_to_zero() {
    let matrix = vec![row(1.0, 7.0), row(3.0, 7.0)];
    let state = ScalerState::from_matrix(&matrix).expect("fits");

    let scaled = state.apply(&matrix);

    assert!(scaled.iter().all(|r| r.values()[1] == 0.0));
    assert!(scaled.iter().all(|r| r.values()[2] == 0.0));
    let expected = 1.0 / (1.0 + EPSILON);
    assert!((scaled[1].values()[0] - expected).abs() < 1e-12);
}

#[test]
fn from_state_is_ready_to_transform() {
    let state = ScalerState::from_matrix(&[row(0.0, 0.0), row(2.0, 2.0)]).expect("fits");
    let scaler = Scaler::from_state(state.clone());

    assert!(scaler.is_fitted());
    assert_eq!(scaler.state(), Some(&state));
}

#[test]
fn fitted_columns_have_unit_spread() {
    let matrix = vec![row(1.0, 100.0), row(2.0, 300.0), row(6.0, 200.0), row(9.0, 250.0)];
    let mut scaler = Scaler::new();
    scaler.fit(&matrix).expect("fits");

    let scaled = scaler.transform(&matrix).expect("fitted");

    let n = scaled.len() as f64;
    for column in 0..2 {
        let mean = scaled.iter().map(|r| r.values()[column]).sum::<f64>() / n;
        let variance = scaled
            .iter()
            .map(|r| (r.values()[column] - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();
        assert!((std - 1.0).abs() < 1e-6, "column {column} std was {std}");
    }
}
