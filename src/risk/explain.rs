use serde::{Deserialize, Serialize};

use super::domain::{Checking, Housing, Record, Savings};
use super::rules::{IDEAL_AGE, LARGE_CREDIT, LONG_DURATION, SHORT_DURATION, SMALL_CREDIT};

/// Human-readable factor analysis attached to every prediction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub warnings: Vec<String>,
    pub positives: Vec<String>,
}

/// Shared by the model and rule paths so both explain a record the same way.
pub fn explain(record: &Record) -> Explanation {
    let mut warnings = Vec::new();
    let mut positives = Vec::new();

    if IDEAL_AGE.contains(&record.age) {
        positives.push("age within the preferred range".to_string());
    } else {
        warnings.push("age outside the preferred range".to_string());
    }

    match record.job_level {
        0 => warnings.push("unemployed or unskilled".to_string()),
        3 => positives.push("highly qualified professional".to_string()),
        _ => {}
    }

    match record.housing {
        Housing::Rent => warnings.push("rented housing".to_string()),
        Housing::Own => positives.push("owns housing".to_string()),
        Housing::Free | Housing::Unknown => {}
    }

    match record.savings {
        Savings::NotAvailable | Savings::Little => {
            warnings.push("insufficient savings".to_string())
        }
        Savings::Rich | Savings::QuiteRich => positives.push("solid savings reserve".to_string()),
        Savings::Moderate | Savings::Unknown => {}
    }

    match record.checking {
        Checking::NotAvailable | Checking::Little => {
            warnings.push("low checking account balance".to_string())
        }
        Checking::Rich | Checking::Moderate => {
            positives.push("healthy checking account balance".to_string())
        }
        Checking::Unknown => {}
    }

    // Scoring already penalises exactly `LARGE_CREDIT`; the warning starts above it.
    if record.credit_amount > LARGE_CREDIT {
        warnings.push("high credit amount".to_string());
    } else if record.credit_amount < SMALL_CREDIT {
        positives.push("moderate credit amount".to_string());
    }

    if record.duration_months > LONG_DURATION {
        warnings.push("long repayment term".to_string());
    } else if record.duration_months <= SHORT_DURATION {
        positives.push("short repayment term".to_string());
    }

    Explanation {
        warnings,
        positives,
    }
}
