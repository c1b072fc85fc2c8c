use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Applicant sex as recorded in the German credit dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Housing situation of the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Housing {
    Own,
    Rent,
    Free,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Savings account bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Savings {
    #[serde(rename = "N/A")]
    NotAvailable,
    #[serde(rename = "little")]
    Little,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "quite rich", alias = "quite_rich")]
    QuiteRich,
    #[serde(rename = "rich")]
    Rich,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Checking account bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Checking {
    #[serde(rename = "N/A")]
    NotAvailable,
    #[serde(rename = "little")]
    Little,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "rich")]
    Rich,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Declared purpose of the credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Purpose {
    #[serde(rename = "car")]
    Car,
    #[serde(rename = "furniture/equipment")]
    FurnitureEquipment,
    #[serde(rename = "radio/TV")]
    RadioTv,
    #[serde(rename = "education")]
    Education,
    #[serde(rename = "business")]
    Business,
    #[serde(rename = "repairs")]
    Repairs,
    #[serde(rename = "vacation/others")]
    VacationOthers,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Credit default risk bucket. Ordered from lowest to highest risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Baixo,
    #[serde(rename = "Médio", alias = "Medio")]
    Medio,
    Alto,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Baixo, RiskLevel::Medio, RiskLevel::Alto];

    /// Inverse of [`RiskLevel::label`], also accepting the unaccented `Medio`.
    pub fn from_label(value: &str) -> Option<RiskLevel> {
        match value.trim() {
            "Baixo" => Some(RiskLevel::Baixo),
            "Médio" | "Medio" => Some(RiskLevel::Medio),
            "Alto" => Some(RiskLevel::Alto),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Baixo => "Baixo",
            RiskLevel::Medio => "Médio",
            RiskLevel::Alto => "Alto",
        }
    }

    /// Lending guidance shown next to an assessment.
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Baixo => {
                "profile suits credit approval; approve with favourable conditions"
            }
            RiskLevel::Medio => {
                "moderate risk; approve with additional guarantees and monthly follow-up"
            }
            RiskLevel::Alto => {
                "high default risk; decline or approve only with strong guarantees and a reduced limit"
            }
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One applicant row. Portuguese keys from the processed dataset are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Record {
    #[serde(default, alias = "idade")]
    pub age: i64,
    #[serde(default, alias = "sexo")]
    pub sex: Sex,
    #[serde(default, alias = "trabalho")]
    pub job_level: i64,
    #[serde(default, alias = "moradia")]
    pub housing: Housing,
    #[serde(default, alias = "poupanca")]
    pub savings: Savings,
    #[serde(default, alias = "conta_corrente")]
    pub checking: Checking,
    #[serde(default, alias = "valor_credito")]
    pub credit_amount: i64,
    #[serde(default, alias = "duracao_meses")]
    pub duration_months: i64,
    #[serde(default, alias = "proposito")]
    pub purpose: Purpose,
    #[serde(
        default,
        alias = "risco",
        deserialize_with = "lenient_risk_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_label: Option<RiskLevel>,
}

/// Labels outside the three levels read as unlabelled, which encodes as the negative class.
fn lenient_risk_label<'de, D>(deserializer: D) -> Result<Option<RiskLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|value| value.as_str()).and_then(RiskLevel::from_label))
}

/// Outcome of one risk prediction, shared by the model and rule paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub is_good_risk: bool,
}

/// Permissive string parsing used by the CLI: unrecognised values fall back to `Unknown`.
macro_rules! lenient_from_str {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = std::convert::Infallible;

                fn from_str(value: &str) -> Result<Self, Self::Err> {
                    let quoted = serde_json::Value::String(value.trim().to_string());
                    Ok(serde_json::from_value(quoted).unwrap_or_default())
                }
            }
        )+
    };
}

lenient_from_str!(Sex, Housing, Savings, Checking, Purpose);
