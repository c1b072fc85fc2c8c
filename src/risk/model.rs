//! A trained network bundled with the scaler statistics it was fitted on, plus
//! its persisted form (gzipped JSON under [`MODEL_KEY`]).
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::domain::Record;
use super::encoding::{encode, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use super::network::RiskNetwork;
use super::scaler::ScalerState;
use super::storage::{KeyValueStore, StorageError, MODEL_KEY};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    network: RiskNetwork,
    scaler: ScalerState,
}

impl TrainedModel {
    pub fn new(network: RiskNetwork, scaler: ScalerState) -> Self {
        Self { network, scaler }
    }

    pub fn network(&self) -> &RiskNetwork {
        &self.network
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    /// Normalise with the bundled scaler, then predict.
    pub fn predict(&self, rows: &[FeatureVector]) -> Vec<f64> {
        self.network.predict(&self.scaler.apply(rows))
    }

    /// `P(risk = Alto)` for one record. Fails when the network yields a non-finite value.
    pub fn predict_record(&self, record: &Record) -> Result<f64, ModelError> {
        let row = self.scaler.apply_one(&encode(record));
        let probability = self.network.forward(row.values());
        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(ModelError::NonFinite { epoch: None })
        }
    }

    /// Fails on non-finite weights, which JSON cannot represent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        self.network.validate()?;
        let blob = ModelBlob {
            format_version: FORMAT_VERSION,
            features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            scaler: self.scaler.clone(),
            network: self.network.clone(),
        };
        let json = serde_json::to_vec(&blob)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        Ok(encoder.finish()?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        let blob: ModelBlob = serde_json::from_slice(&json)?;
        blob.into_model()
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<(), ModelError> {
        store.set(MODEL_KEY, &self.to_bytes()?)?;
        Ok(())
    }

    /// `Ok(None)` on a cold start; absence is not an error.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Option<Self>, ModelError> {
        match store.get(MODEL_KEY)? {
            Some(bytes) => Self::from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelBlob {
    format_version: u32,
    features: Vec<String>,
    scaler: ScalerState,
    network: RiskNetwork,
}

impl ModelBlob {
    fn into_model(self) -> Result<TrainedModel, ModelError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelError::SchemaMismatch(format!(
                "format version {} (expected {FORMAT_VERSION})",
                self.format_version
            )));
        }
        let expected = FEATURE_NAMES.iter().map(|name| name.to_string());
        if self.features.len() != FEATURE_COUNT || !self.features.iter().cloned().eq(expected) {
            return Err(ModelError::SchemaMismatch(format!(
                "feature layout [{}]",
                self.features.join(", ")
            )));
        }
        self.network.validate()?;
        Ok(TrainedModel::new(self.network, self.scaler))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid network shape: {0}")]
    Shape(String),
    #[error("non-finite values in network{}", .epoch.map(|e| format!(" at epoch {}", e + 1)).unwrap_or_default())]
    NonFinite { epoch: Option<usize> },
    #[error("stored model does not match the feature schema: {0}")]
    SchemaMismatch(String),
    #[error("model blob is not valid JSON: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("model blob compression failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
