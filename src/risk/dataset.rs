//! Dataset loading (JSON records or the raw German credit CSV), heuristic
//! labelling, summary statistics, and synthetic data.
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::domain::{Checking, Housing, Purpose, Record, RiskLevel, Savings, Sex};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON dataset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid German credit CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// JSON array of records, English or Portuguese keys.
pub fn load_json<R: Read>(reader: R) -> Result<Vec<Record>, DatasetError> {
    Ok(serde_json::from_reader(reader)?)
}

/// Loads `.csv` files through [`import_german_csv`], anything else as JSON.
pub fn load_path(path: &Path) -> Result<Vec<Record>, DatasetError> {
    let file = BufReader::new(File::open(path)?);
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        import_german_csv(file)
    } else {
        load_json(file)
    }
}

pub fn write_json<W: Write>(writer: W, records: &[Record]) -> Result<(), DatasetError> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct GermanCreditRow {
    #[serde(rename = "Age")]
    age: i64,
    #[serde(rename = "Sex")]
    sex: String,
    #[serde(rename = "Job")]
    job: i64,
    #[serde(rename = "Housing")]
    housing: String,
    #[serde(rename = "Saving accounts", default, deserialize_with = "missing_as_none")]
    savings: Option<String>,
    #[serde(rename = "Checking account", default, deserialize_with = "missing_as_none")]
    checking: Option<String>,
    #[serde(rename = "Credit amount")]
    credit_amount: i64,
    #[serde(rename = "Duration")]
    duration: i64,
    #[serde(rename = "Purpose")]
    purpose: String,
}

fn missing_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| {
        let trimmed = value.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("na") && !trimmed.eq_ignore_ascii_case("nan")
    }))
}

impl GermanCreditRow {
    fn into_record(self) -> Record {
        let mut record = Record {
            age: self.age,
            sex: self.sex.parse().unwrap_or_default(),
            job_level: self.job,
            housing: self.housing.parse().unwrap_or_default(),
            savings: self
                .savings
                .map(|value| value.parse().unwrap_or_default())
                .unwrap_or(Savings::NotAvailable),
            checking: self
                .checking
                .map(|value| value.parse().unwrap_or_default())
                .unwrap_or(Checking::NotAvailable),
            credit_amount: self.credit_amount,
            duration_months: self.duration,
            purpose: self.purpose.parse().unwrap_or_default(),
            risk_label: None,
        };
        record.risk_label = Some(heuristic_label(&record));
        record
    }
}

/// Reads the raw German credit export and labels every row with [`heuristic_label`].
pub fn import_german_csv<R: Read>(reader: R) -> Result<Vec<Record>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize::<GermanCreditRow>() {
        records.push(row?.into_record());
    }
    Ok(records)
}

/// Risk level the raw dataset lacks, derived from simple profile penalties.
pub fn heuristic_label(record: &Record) -> RiskLevel {
    let mut score = 0;
    if record.age < 25 || record.age > 60 {
        score += 1;
    }
    score += match record.job_level {
        0 => 2,
        1 => 1,
        _ => 0,
    };
    if record.housing == Housing::Rent {
        score += 1;
    }
    if matches!(record.savings, Savings::NotAvailable | Savings::Little) {
        score += 1;
    }
    if matches!(record.checking, Checking::NotAvailable | Checking::Little) {
        score += 1;
    }
    if record.credit_amount > 7000 {
        score += 1;
    }
    if record.duration_months > 36 {
        score += 1;
    }

    if score >= 5 {
        RiskLevel::Alto
    } else if score >= 3 {
        RiskLevel::Medio
    } else {
        RiskLevel::Baixo
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: RiskLevel,
    pub count: usize,
    pub mean_credit_amount: f64,
    pub mean_duration_months: f64,
}

/// Per-level series plotted by the exploratory charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub unlabeled: usize,
    pub levels: Vec<LevelSummary>,
}

impl DatasetSummary {
    pub fn from_records(records: &[Record]) -> Self {
        let levels = RiskLevel::ALL
            .iter()
            .map(|&level| {
                let rows: Vec<&Record> = records
                    .iter()
                    .filter(|record| record.risk_label == Some(level))
                    .collect();
                LevelSummary {
                    level,
                    count: rows.len(),
                    mean_credit_amount: mean(rows.iter().map(|r| r.credit_amount)),
                    mean_duration_months: mean(rows.iter().map(|r| r.duration_months)),
                }
            })
            .collect();

        Self {
            total: records.len(),
            unlabeled: records.iter().filter(|r| r.risk_label.is_none()).count(),
            levels,
        }
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        self.levels
            .iter()
            .find(|summary| summary.level == level)
            .map(|summary| summary.count)
            .unwrap_or(0)
    }
}

fn mean(values: impl Iterator<Item = i64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v as f64, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

const PURPOSES: [Purpose; 7] = [
    Purpose::Car,
    Purpose::FurnitureEquipment,
    Purpose::RadioTv,
    Purpose::Education,
    Purpose::Business,
    Purpose::Repairs,
    Purpose::VacationOthers,
];

fn pick<T: Copy, R: Rng>(rng: &mut R, options: &[T]) -> T {
    options[rng.gen_range(0..options.len())]
}

/// `n` labelled records split 40/35/25 across Baixo/Médio/Alto, interleaved in a
/// seeded random order. Field distributions lean towards each record's level.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    let alto = n * 25 / 100;
    let medio = n * 35 / 100;
    let baixo = n - alto - medio;

    let mut levels = Vec::with_capacity(n);
    levels.extend(std::iter::repeat(RiskLevel::Baixo).take(baixo));
    levels.extend(std::iter::repeat(RiskLevel::Medio).take(medio));
    levels.extend(std::iter::repeat(RiskLevel::Alto).take(alto));
    levels.shuffle(&mut rng);

    levels
        .into_iter()
        .map(|level| synthetic_record(level, &mut rng))
        .collect()
}

fn synthetic_record<R: Rng>(level: RiskLevel, rng: &mut R) -> Record {
    let sex = pick(rng, &[Sex::Male, Sex::Female]);
    let purpose = pick(rng, &PURPOSES);
    match level {
        RiskLevel::Baixo => Record {
            age: rng.gen_range(25..=60),
            sex,
            job_level: rng.gen_range(2..=3),
            housing: pick(rng, &[Housing::Own, Housing::Own, Housing::Free]),
            savings: pick(rng, &[Savings::Moderate, Savings::QuiteRich, Savings::Rich]),
            checking: pick(rng, &[Checking::Moderate, Checking::Rich]),
            credit_amount: rng.gen_range(500..4000),
            duration_months: rng.gen_range(6..=24),
            purpose,
            risk_label: Some(level),
        },
        RiskLevel::Medio => Record {
            age: rng.gen_range(22..=65),
            sex,
            job_level: rng.gen_range(1..=2),
            housing: pick(rng, &[Housing::Own, Housing::Rent, Housing::Free]),
            savings: pick(rng, &[Savings::Little, Savings::Moderate, Savings::NotAvailable]),
            checking: pick(rng, &[Checking::Little, Checking::Moderate]),
            credit_amount: rng.gen_range(2000..8000),
            duration_months: rng.gen_range(12..=36),
            purpose,
            risk_label: Some(level),
        },
        RiskLevel::Alto => Record {
            age: if rng.gen_bool(0.5) {
                rng.gen_range(19..=24)
            } else {
                rng.gen_range(61..=75)
            },
            sex,
            job_level: rng.gen_range(0..=1),
            housing: pick(rng, &[Housing::Rent, Housing::Rent, Housing::Free]),
            savings: pick(rng, &[Savings::NotAvailable, Savings::Little]),
            checking: pick(rng, &[Checking::NotAvailable, Checking::Little]),
            credit_amount: rng.gen_range(6000..15000),
            duration_months: rng.gen_range(30..=60),
            purpose,
            risk_label: Some(level),
        },
    }
}
