use serde::{Deserialize, Serialize};

use super::domain::{Checking, Housing, Purpose, Record, RiskLevel, Savings, Sex};

/// Number of encoded columns; training and inference share this layout.
pub const FEATURE_COUNT: usize = 9;

/// Column names in encoding order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "age",
    "sex",
    "job_level",
    "housing",
    "savings",
    "checking",
    "credit_amount",
    "duration_months",
    "purpose",
];

/// Fixed-order numeric encoding of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

/// Features and binary labels in matching row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBatch {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<f64>,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Order-preserving split: rows `[0, at)` and `[at, len)`.
    pub fn split_at(&self, at: usize) -> (EncodedBatch, EncodedBatch) {
        let at = at.min(self.len());
        let (train_x, test_x) = self.features.split_at(at);
        let (train_y, test_y) = self.labels.split_at(at);
        (
            EncodedBatch {
                features: train_x.to_vec(),
                labels: train_y.to_vec(),
            },
            EncodedBatch {
                features: test_x.to_vec(),
                labels: test_y.to_vec(),
            },
        )
    }
}

/// Encode one record. Unknown categories map to code 0.
pub fn encode(record: &Record) -> FeatureVector {
    FeatureVector([
        record.age as f64,
        encode_sex(record.sex),
        record.job_level as f64,
        encode_housing(record.housing),
        encode_savings(record.savings),
        encode_checking(record.checking),
        record.credit_amount as f64,
        record.duration_months as f64,
        encode_purpose(record.purpose),
    ])
}

/// Encode every record and derive its label (`Alto` is the positive class).
pub fn encode_batch(records: &[Record]) -> EncodedBatch {
    let mut batch = EncodedBatch {
        features: Vec::with_capacity(records.len()),
        labels: Vec::with_capacity(records.len()),
    };
    for record in records {
        batch.features.push(encode(record));
        batch.labels.push(label(record));
    }
    batch
}

pub fn label(record: &Record) -> f64 {
    match record.risk_label {
        Some(RiskLevel::Alto) => 1.0,
        _ => 0.0,
    }
}

fn encode_sex(sex: Sex) -> f64 {
    match sex {
        Sex::Male => 1.0,
        Sex::Female | Sex::Unknown => 0.0,
    }
}

fn encode_housing(housing: Housing) -> f64 {
    match housing {
        Housing::Own => 2.0,
        Housing::Rent => 1.0,
        Housing::Free | Housing::Unknown => 0.0,
    }
}

fn encode_savings(savings: Savings) -> f64 {
    match savings {
        Savings::NotAvailable | Savings::Unknown => 0.0,
        Savings::Little => 1.0,
        Savings::Moderate => 2.0,
        Savings::QuiteRich => 3.0,
        Savings::Rich => 4.0,
    }
}

fn encode_checking(checking: Checking) -> f64 {
    match checking {
        Checking::NotAvailable | Checking::Unknown => 0.0,
        Checking::Little => 1.0,
        Checking::Moderate => 2.0,
        Checking::Rich => 3.0,
    }
}

fn encode_purpose(purpose: Purpose) -> f64 {
    match purpose {
        Purpose::Car | Purpose::Unknown => 0.0,
        Purpose::FurnitureEquipment => 1.0,
        Purpose::RadioTv => 2.0,
        Purpose::Education => 3.0,
        Purpose::Business => 4.0,
        Purpose::Repairs => 5.0,
        Purpose::VacationOthers => 6.0,
    }
}
