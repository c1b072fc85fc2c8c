use serde::{Deserialize, Serialize};

use super::encoding::{FeatureVector, FEATURE_COUNT};

/// Added to the standard deviation so constant columns do not divide by zero.
pub const EPSILON: f64 = 1e-7;

/// Column statistics captured by [`Scaler::fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

impl ScalerState {
    /// Column-wise mean and population standard deviation.
    pub fn from_matrix(matrix: &[FeatureVector]) -> Result<Self, ScalerError> {
        if matrix.is_empty() {
            return Err(ScalerError::Empty);
        }
        let rows = matrix.len() as f64;

        let mut mean = [0.0; FEATURE_COUNT];
        for row in matrix {
            for (acc, value) in mean.iter_mut().zip(row.values()) {
                *acc += value;
            }
        }
        for value in &mut mean {
            *value /= rows;
        }

        let mut std = [0.0; FEATURE_COUNT];
        for row in matrix {
            for ((acc, value), m) in std.iter_mut().zip(row.values()).zip(&mean) {
                *acc += (value - m).powi(2);
            }
        }
        for value in &mut std {
            *value = (*value / rows).sqrt();
        }

        Ok(Self { mean, std })
    }

    pub fn apply_one(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (row.0[i] - self.mean[i]) / (self.std[i] + EPSILON);
        }
        FeatureVector(out)
    }

    pub fn apply(&self, matrix: &[FeatureVector]) -> Vec<FeatureVector> {
        matrix.iter().map(|row| self.apply_one(row)).collect()
    }
}

/// Z-score normaliser. Must be fitted before it can transform.
#[derive(Debug, Clone, Default)]
pub struct Scaler {
    state: Option<ScalerState>,
}

impl Scaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ScalerState) -> Self {
        Self { state: Some(state) }
    }

    /// Fit on `matrix`, replacing any earlier statistics.
    pub fn fit(&mut self, matrix: &[FeatureVector]) -> Result<ScalerState, ScalerError> {
        let state = ScalerState::from_matrix(matrix)?;
        self.state = Some(state.clone());
        Ok(state)
    }

    pub fn transform(&self, matrix: &[FeatureVector]) -> Result<Vec<FeatureVector>, StateError> {
        let state = self.state.as_ref().ok_or(StateError::NotFitted)?;
        Ok(state.apply(matrix))
    }

    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScalerError {
    #[error("cannot fit scaler on an empty feature matrix")]
    Empty,
}

/// An operation needed a prior fit or training run that has not happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("scaler not fitted")]
    NotFitted,
}
