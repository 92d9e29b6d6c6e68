//! Tests for shelf-model types.

use shelf_model::{
    AnalysisOptions, BoundKind, FailureKind, Grouping, LimitDirection, LotGroup, ModelError,
    PoolabilityResult, SpecLimit, StabilityRecord, group_records,
};

fn record(product: &str, lot: &str, time: f64, purity: f64) -> StabilityRecord {
    StabilityRecord::new(product, lot, time).with_assay("purity", purity)
}

#[test]
fn test_group_records_orders_lots() {
    let groups = group_records(vec![
        record("LOTB", "LOTB-001", 0.0, 99.6),
        record("LOTA", "LOTA-002", 0.0, 99.7),
        record("LOTA", "LOTA-001", 0.0, 99.8),
        record("LOTA", "LOTA-001", 3.0, 99.6),
    ])
    .expect("group records");
    let lots: Vec<&str> = groups.iter().map(|group| group.lot_id()).collect();
    assert_eq!(lots, vec!["LOTA-001", "LOTA-002", "LOTB-001"]);
    assert_eq!(groups[0].records().len(), 2);
    assert_eq!(groups[0].product_id(), "LOTA");
}

#[test]
fn test_group_records_splits_lot_shared_by_two_products() {
    let groups = group_records(vec![
        record("LOTA", "L1", 0.0, 99.8),
        record("LOTB", "L1", 3.0, 99.6),
    ])
    .expect("group records");
    let products: Vec<&str> = groups.iter().map(|group| group.product_id()).collect();
    assert_eq!(products, vec!["LOTA", "LOTB"]);
    assert!(groups.iter().all(|group| group.lot_id() == "L1"));
}

#[test]
fn test_lot_group_rejects_lot_under_two_products() {
    let error = LotGroup::new(vec![
        record("LOTA", "L1", 0.0, 99.8),
        record("LOTB", "L1", 3.0, 99.6),
    ])
    .unwrap_err();
    assert_eq!(
        error,
        ModelError::MixedProducts {
            lot_id: "L1".to_string(),
            expected: "LOTA".to_string(),
            found: "LOTB".to_string(),
        }
    );
}

#[test]
fn test_poolability_result_serializes() {
    let result = PoolabilityResult::failed(
        "purity",
        FailureKind::InsufficientData,
        "lot L1 has a single timepoint",
        2,
        4,
    );
    let json = serde_json::to_string(&result).expect("serialize result");
    assert!(json.contains("\"failure\":\"insufficient_data\""));
    let round: PoolabilityResult = serde_json::from_str(&json).expect("deserialize result");
    assert_eq!(round, result);
}

#[test]
fn test_spec_limit_deserializes_lowercase_direction() {
    let limit: SpecLimit =
        serde_json::from_str(r#"{"value": 0.75, "direction": "upper"}"#).expect("parse");
    assert_eq!(limit.direction, LimitDirection::Upper);
    assert_eq!(limit.to_string(), "<= 0.75");
}

#[test]
fn test_options_fill_missing_fields_with_defaults() {
    let options: AnalysisOptions =
        serde_json::from_str(r#"{"confidence": 0.99, "bound": "prediction"}"#).expect("parse");
    assert_eq!(options.confidence, 0.99);
    assert_eq!(options.significance, 0.05);
    assert_eq!(options.bound, BoundKind::Prediction);
    assert_eq!(Grouping::PerLot.to_string(), "per-lot");
}
