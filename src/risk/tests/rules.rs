use super::common::*;
use crate::risk::domain::{Checking, Housing, RiskLevel, Savings};
use crate::risk::explain::explain;
use crate::risk::rules::{RiskFactor, RuleScorer, LARGE_CREDIT};

#[test]
fn young_renter_scores_high_risk() {
    let score = RuleScorer::new().score(&young_renter());

    assert_eq!(score.points, 19);
    assert_eq!(score.assessment.risk_level, RiskLevel::Alto);
    assert_eq!(score.assessment.probability, 28.5);
    assert!((score.assessment.risk_score - 0.81).abs() < 1e-12);
    assert!(!score.assessment.is_good_risk);
}

#[test]
fn established_owner_scores_low_risk() {
    let score = RuleScorer::new().score(&established_owner());

    assert_eq!(score.points, 100);
    assert_eq!(score.assessment.risk_level, RiskLevel::Baixo);
    assert_eq!(score.assessment.probability, 94.0);
    assert_eq!(score.assessment.risk_score, 0.0);
    assert!(score.assessment.is_good_risk);
}

#[test]
fn components_cover_every_factor() {
    let score = RuleScorer::new().score(&young_renter());

    let factors: Vec<RiskFactor> = score.components.iter().map(|c| c.factor).collect();
    assert_eq!(
        factors,
        vec![
            RiskFactor::Age,
            RiskFactor::JobLevel,
            RiskFactor::Housing,
            RiskFactor::Savings,
            RiskFactor::Checking,
            RiskFactor::CreditAmount,
            RiskFactor::DurationMonths,
        ]
    );
    let max: u32 = score.components.iter().map(|c| u32::from(c.max_points)).sum();
    assert_eq!(max, 100);
}

#[test]
fn middle_profile_scores_medium_risk() {
    let mut record = established_owner();
    record.job_level = 1;
    record.housing = Housing::Rent;
    record.savings = Savings::Moderate;
    record.checking = Checking::Little;
    record.credit_amount = 5000;
    record.duration_months = 24;

    let score = RuleScorer::new().score(&record);

    // 15 + 8 + 3 + 8 + 3 + 8 + 6
    assert_eq!(score.points, 51);
    assert_eq!(score.assessment.risk_level, RiskLevel::Medio);
    assert_eq!(score.assessment.probability, 51.0);
}

#[test]
fn credit_boundaries_follow_buckets() {
    let scorer = RuleScorer::new();
    let credit_points = |amount| {
        let mut record = established_owner();
        record.credit_amount = amount;
        scorer
            .score(&record)
            .components
            .into_iter()
            .find(|c| c.factor == RiskFactor::CreditAmount)
            .map(|c| c.points)
    };

    assert_eq!(credit_points(2999), Some(15));
    assert_eq!(credit_points(3000), Some(8));
    assert_eq!(credit_points(6999), Some(8));
    assert_eq!(credit_points(7000), Some(3));
}

#[test]
fn explanation_mirrors_factors() {
    let risky = explain(&young_renter());
    let solid = explain(&established_owner());

    assert!(risky.positives.is_empty());
    assert_eq!(risky.warnings.len(), 7);
    assert!(solid.warnings.is_empty());
    assert!(solid.positives.contains(&"owns housing".to_string()));
}

#[test]
fn scoring_is_deterministic() {
    let scorer = RuleScorer::new();

    for record in [young_renter(), established_owner()] {
        let first = scorer.score(&record);
        let second = RuleScorer::new().score(&record);
        assert_eq!(first, second);
    }
}

#[test]
fn high_credit_warning_starts_above_the_boundary() {
    let mut record = established_owner();
    record.credit_amount = LARGE_CREDIT;
    let at_boundary = explain(&record);
    record.credit_amount = LARGE_CREDIT + 1;
    let above = explain(&record);

    assert!(!at_boundary.warnings.iter().any(|w| w == "high credit amount"));
    assert!(above.warnings.iter().any(|w| w == "high credit amount"));
}
