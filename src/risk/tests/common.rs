use std::sync::Arc;

use crate::risk::domain::{Checking, Housing, Purpose, Record, RiskLevel, Savings, Sex};
use crate::risk::network::FitOptions;
use crate::risk::storage::{KeyValueStore, MemoryStore, StorageError};
use crate::risk::training::{ScalerFit, TrainingConfig, TRAIN_FRACTION};

/// Scenario B: young renter asking for a large, long loan.
pub(super) fn young_renter() -> Record {
    Record {
        age: 22,
        sex: Sex::Male,
        job_level: 0,
        housing: Housing::Rent,
        savings: Savings::Little,
        checking: Checking::Little,
        credit_amount: 8000,
        duration_months: 48,
        purpose: Purpose::Car,
        risk_label: None,
    }
}

/// Scenario C: established home owner with a small, short loan.
pub(super) fn established_owner() -> Record {
    Record {
        age: 40,
        sex: Sex::Female,
        job_level: 3,
        housing: Housing::Own,
        savings: Savings::Rich,
        checking: Checking::Rich,
        credit_amount: 2000,
        duration_months: 12,
        purpose: Purpose::RadioTv,
        risk_label: None,
    }
}

pub(super) fn labelled(mut record: Record, level: RiskLevel) -> Record {
    record.risk_label = Some(level);
    record
}

pub(super) fn fast_config(seed: u64) -> TrainingConfig {
    TrainingConfig {
        fit: FitOptions {
            epochs: 3,
            batch_size: 16,
            shuffle: true,
        },
        train_fraction: TRAIN_FRACTION,
        scaler_fit: ScalerFit::TrainSplit,
        seed: Some(seed),
    }
}

pub(super) fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Accepts everything except writes to one key.
#[derive(Default)]
pub(super) struct FailingKeyStore {
    pub(super) inner: MemoryStore,
    pub(super) failing_key: &'static str,
}

impl FailingKeyStore {
    pub(super) fn failing_on(key: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_key: key,
        }
    }
}

impl KeyValueStore for FailingKeyStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if key == self.failing_key {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

pub(super) struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Unavailable("store offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("store offline".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("store offline".to_string()))
    }
}
