use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::domain::{Checking, Housing, Record, RiskAssessment, RiskLevel, Savings};

pub(crate) const IDEAL_AGE: RangeInclusive<i64> = 25..=60;
pub(crate) const SMALL_CREDIT: i64 = 3000;
pub(crate) const LARGE_CREDIT: i64 = 7000;
pub(crate) const SHORT_DURATION: i64 = 18;
pub(crate) const LONG_DURATION: i64 = 36;

const LOW_RISK_FLOOR: f64 = 70.0;
const MEDIUM_RISK_FLOOR: f64 = 40.0;

/// Factors scored by the rule-based fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    Age,
    JobLevel,
    Housing,
    Savings,
    Checking,
    CreditAmount,
    DurationMonths,
}

/// Points awarded for one factor, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: RiskFactor,
    pub points: u8,
    pub max_points: u8,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleScore {
    pub assessment: RiskAssessment,
    /// Low-risk points in `[16, 100]`.
    pub points: u8,
    pub components: Vec<ScoreComponent>,
}

/// Deterministic additive scorer used when no trained model is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

impl RuleScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, record: &Record) -> RuleScore {
        let components = vec![
            age_component(record.age),
            job_component(record.job_level),
            housing_component(record.housing),
            savings_component(record.savings),
            checking_component(record.checking),
            credit_component(record.credit_amount),
            duration_component(record.duration_months),
        ];
        let points: u8 = components.iter().map(|c| c.points).sum();

        RuleScore {
            assessment: classify(points),
            points,
            components,
        }
    }
}

/// Points are already on a 0–100 scale.
fn classify(points: u8) -> RiskAssessment {
    let pct = f64::from(points);
    let (risk_level, confidence) = if pct >= LOW_RISK_FLOOR {
        (RiskLevel::Baixo, (70.0 + (pct - 70.0) * 0.8).min(95.0))
    } else if pct >= MEDIUM_RISK_FLOOR {
        (RiskLevel::Medio, 40.0 + (pct - 40.0))
    } else {
        (RiskLevel::Alto, (pct * 1.5).max(15.0))
    };
    let risk_score = 1.0 - pct / 100.0;

    RiskAssessment {
        risk_score,
        risk_level,
        probability: confidence,
        is_good_risk: risk_score < 0.5,
    }
}

fn component(factor: RiskFactor, points: u8, max_points: u8, notes: String) -> ScoreComponent {
    ScoreComponent {
        factor,
        points,
        max_points,
        notes,
    }
}

fn age_component(age: i64) -> ScoreComponent {
    if IDEAL_AGE.contains(&age) {
        component(RiskFactor::Age, 15, 15, format!("age {age} within 25-60"))
    } else {
        component(RiskFactor::Age, 3, 15, format!("age {age} outside 25-60"))
    }
}

fn job_component(level: i64) -> ScoreComponent {
    let points = match level {
        0 => 2,
        1 => 8,
        2 => 15,
        _ => 20,
    };
    component(RiskFactor::JobLevel, points, 20, format!("job level {level}"))
}

fn housing_component(housing: Housing) -> ScoreComponent {
    let (points, notes) = match housing {
        Housing::Own => (10, "owns housing"),
        Housing::Free => (6, "housing provided free"),
        Housing::Rent => (3, "rents housing"),
        Housing::Unknown => (3, "housing not reported"),
    };
    component(RiskFactor::Housing, points, 10, notes.to_string())
}

fn savings_component(savings: Savings) -> ScoreComponent {
    let (points, notes) = match savings {
        Savings::Rich => (15, "rich savings"),
        Savings::QuiteRich => (12, "quite rich savings"),
        Savings::Moderate => (8, "moderate savings"),
        Savings::Little | Savings::NotAvailable | Savings::Unknown => {
            (3, "little or no savings")
        }
    };
    component(RiskFactor::Savings, points, 15, notes.to_string())
}

fn checking_component(checking: Checking) -> ScoreComponent {
    let (points, notes) = match checking {
        Checking::Rich => (15, "rich checking balance"),
        Checking::Moderate => (10, "moderate checking balance"),
        Checking::Little | Checking::NotAvailable | Checking::Unknown => {
            (3, "low or no checking balance")
        }
    };
    component(RiskFactor::Checking, points, 15, notes.to_string())
}

fn credit_component(amount: i64) -> ScoreComponent {
    let points = if amount < SMALL_CREDIT {
        15
    } else if amount < LARGE_CREDIT {
        8
    } else {
        3
    };
    component(
        RiskFactor::CreditAmount,
        points,
        15,
        format!("credit amount {amount}"),
    )
}

fn duration_component(months: i64) -> ScoreComponent {
    let points = if months <= SHORT_DURATION {
        10
    } else if months <= LONG_DURATION {
        6
    } else {
        2
    };
    component(
        RiskFactor::DurationMonths,
        points,
        10,
        format!("{months} month term"),
    )
}
