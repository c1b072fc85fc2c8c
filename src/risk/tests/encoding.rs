use super::common::*;
use crate::risk::domain::{Checking, Housing, Purpose, RiskLevel, Savings, Sex};
use crate::risk::encoding::{encode, encode_batch, FEATURE_COUNT};

#[test]
fn encodes_fields_in_fixed_order() {
    let features = encode(&young_renter());

    assert_eq!(
        features.values(),
        &[22.0, 1.0, 0.0, 1.0, 1.0, 1.0, 8000.0, 48.0, 0.0]
    );
}

#[test]
fn unknown_categories_encode_as_zero() {
    let mut record = established_owner();
    record.housing = Housing::Unknown;
    record.savings = Savings::Unknown;

    let features = encode(&record);

    assert_eq!(features.values()[3], 0.0);
    assert_eq!(features.values()[4], 0.0);
    assert_eq!(features.values().len(), FEATURE_COUNT);
}

#[test]
fn only_alto_is_positive() {
    let records = vec![
        labelled(young_renter(), RiskLevel::Alto),
        labelled(young_renter(), RiskLevel::Medio),
        labelled(established_owner(), RiskLevel::Baixo),
        established_owner(),
    ];

    let batch = encode_batch(&records);

    assert_eq!(batch.labels, vec![1.0, 0.0, 0.0, 0.0]);
    assert_eq!(batch.len(), 4);
}

#[test]
fn split_preserves_order_and_clamps() {
    let records: Vec<_> = (0..5)
        .map(|age| {
            let mut record = established_owner();
            record.age = 30 + age;
            record
        })
        .collect();
    let batch = encode_batch(&records);

    let (head, tail) = batch.split_at(4);
    assert_eq!(head.len(), 4);
    assert_eq!(tail.features[0].values()[0], 34.0);

    let (all, none) = batch.split_at(99);
    assert_eq!(all.len(), 5);
    assert!(none.is_empty());
}

#[test]
fn encoded_components_are_always_finite() {
    let mut extremes = Vec::new();
    for (age, credit, duration) in [
        (0, 0, 0),
        (18, 1_000_000, 72),
        (i64::MAX, i64::MAX, i64::MAX),
        (i64::MIN, -1, -1),
    ] {
        let mut record = young_renter();
        record.age = age;
        record.credit_amount = credit;
        record.duration_months = duration;
        extremes.push(record);
    }
    let mut unknown = established_owner();
    unknown.sex = Sex::Unknown;
    unknown.housing = Housing::Unknown;
    unknown.savings = Savings::Unknown;
    unknown.checking = Checking::Unknown;
    unknown.purpose = Purpose::Unknown;
    extremes.push(unknown);

    for record in &extremes {
        let features = encode(record);
        assert!(
            features.values().iter().all(|v| v.is_finite()),
            "non-finite encoding for {record:?}: {features:?}"
        );
    }
}
