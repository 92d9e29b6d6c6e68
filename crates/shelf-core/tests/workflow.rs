//! End-to-end workflow over synthetic studies.

use std::collections::BTreeMap;

use shelf_core::{AnalysisContext, CoreError, ResultCache, analyze_study, analyze_study_cached};
use shelf_model::{FailureKind, Grouping, SpecLimit, StabilityRecord};

fn limits() -> BTreeMap<String, SpecLimit> {
    BTreeMap::from([
        ("purity".to_string(), SpecLimit::lower(98.0)),
        ("main_impurity".to_string(), SpecLimit::upper(0.75)),
    ])
}

/// Two lots of product P1 with parallel purity decay and a product P2
/// with one lot.
fn study() -> Vec<StabilityRecord> {
    let noise = [0.03, -0.02, 0.01, -0.03, 0.02, 0.0, -0.01];
    let times = [0.0, 3.0, 6.0, 9.0, 12.0, 18.0, 24.0];
    let mut records = Vec::new();
    for (lot, start, offset) in [("P1-A", 99.8, 1.0), ("P1-B", 99.7, -1.0)] {
        for (i, &time) in times.iter().enumerate() {
            records.push(
                StabilityRecord::new("P1", lot, time)
                    .with_assay("purity", start - 0.05 * time + offset * noise[i])
                    .with_assay("main_impurity", 0.1 + 0.01 * time + offset * noise[i] / 10.0),
            );
        }
    }
    for (i, &time) in times.iter().enumerate() {
        records.push(
            StabilityRecord::new("P2", "P2-A", time)
                .with_assay("purity", 99.9 - 0.02 * time + noise[6 - i]),
        );
    }
    records
}

#[test]
fn test_analyses_each_product_in_assay_order() {
    let context = AnalysisContext::new(limits())
        .with_assays(vec!["purity".to_string(), "main_impurity".to_string()]);
    let analysis = analyze_study(study(), &context).unwrap();

    let products: Vec<&str> = analysis
        .products
        .iter()
        .map(|product| product.product_id.as_str())
        .collect();
    assert_eq!(products, vec!["P1", "P2"]);

    let p1 = &analysis.products[0];
    let assays: Vec<&str> = p1.assays.iter().map(|o| o.assay.as_str()).collect();
    assert_eq!(assays, vec!["purity", "main_impurity"]);
    let purity = &p1.assays[0];
    assert!(purity.poolability.as_ref().unwrap().poolable);
    assert_eq!(purity.grouping, Grouping::Pooled);
    assert!(purity.shelf_life().is_some());
}

#[test]
fn test_single_lot_product_is_pooled_without_test() {
    let context = AnalysisContext::new(limits()).with_product("P2");
    let analysis = analyze_study(study(), &context).unwrap();
    assert_eq!(analysis.products.len(), 1);
    let purity = analysis.products[0]
        .assays
        .iter()
        .find(|o| o.assay == "purity")
        .unwrap();
    assert!(purity.poolability.is_none());
    assert_eq!(purity.grouping, Grouping::Pooled);
}

#[test]
fn test_failing_assay_does_not_abort_siblings() {
    // P2 has no impurity data at all.
    let context = AnalysisContext::new(limits()).with_product("P2");
    let analysis = analyze_study(study(), &context).unwrap();
    let outcomes = &analysis.products[0].assays;
    assert_eq!(outcomes.len(), 2);
    let impurity = outcomes.iter().find(|o| o.assay == "main_impurity").unwrap();
    assert_eq!(
        impurity.failure.as_ref().map(|f| f.kind),
        Some(FailureKind::InsufficientData)
    );
    let purity = outcomes.iter().find(|o| o.assay == "purity").unwrap();
    assert!(purity.projection.is_some());
    assert_eq!(analysis.failure_count(), 1);
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let parallel = analyze_study(study(), &AnalysisContext::new(limits())).unwrap();
    let sequential = analyze_study(
        study(),
        &AnalysisContext::new(limits()).with_parallel(false),
    )
    .unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn test_cache_reuses_unchanged_inputs_only() {
    for parallel in [false, true] {
        let context = AnalysisContext::new(limits()).with_parallel(parallel);
        let mut cache = ResultCache::new();
        let first = analyze_study_cached(study(), &context, &mut cache).unwrap();
        assert_eq!((cache.hits(), cache.misses()), (0, 4));

        let second = analyze_study_cached(study(), &context, &mut cache).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 4);

        let mut changed = study();
        changed[0] = changed[0].clone().with_assay("purity", 99.0);
        let third = analyze_study_cached(changed, &context, &mut cache).unwrap();
        assert_eq!(cache.misses(), 5);
        assert_eq!(cache.len(), 4);
        assert_ne!(first.products[0].assays[1], third.products[0].assays[1]);
    }
}

#[test]
fn test_unknown_selection_is_an_error() {
    let err = analyze_study(study(), &AnalysisContext::new(limits()).with_product("P9"))
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownProduct { .. }));

    let err = analyze_study(
        study(),
        &AnalysisContext::new(limits()).with_lots(["P1-A", "P1-Z"]),
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::UnknownLots { ref lots, .. } if lots == &["P1-Z".to_string()]));

    let err = analyze_study(Vec::new(), &AnalysisContext::new(limits())).unwrap_err();
    assert!(matches!(err, CoreError::NoRecords));
}

#[test]
fn test_lot_selection_narrows_the_test() {
    let context = AnalysisContext::new(limits())
        .with_product("P1")
        .with_lots(["P1-A"]);
    let analysis = analyze_study(study(), &context).unwrap();
    let purity = analysis.products[0]
        .assays
        .iter()
        .find(|o| o.assay == "purity")
        .unwrap();
    assert_eq!(purity.lot_ids, vec!["P1-A".to_string()]);
    assert!(purity.poolability.is_none());
}

#[test]
fn test_outcome_serialises_failure_kind() {
    let context = AnalysisContext::new(limits()).with_product("P2");
    let analysis = analyze_study(study(), &context).unwrap();
    let json = serde_json::to_value(&analysis).unwrap();
    let impurity = &json["products"][0]["assays"][0];
    assert_eq!(impurity["assay"], "main_impurity");
    assert_eq!(impurity["failure"]["kind"], "insufficient_data");
}

#[test]
fn test_products_sharing_a_lot_id_are_analysed_separately() {
    let times = [0.0, 3.0, 6.0, 9.0, 12.0];
    let noise = [0.02, -0.03, 0.01, 0.02, -0.02];
    let mut records = Vec::new();
    for (product, rate) in [("A", 0.05), ("B", 0.2)] {
        for (i, &time) in times.iter().enumerate() {
            records.push(
                StabilityRecord::new(product, "L1", time)
                    .with_assay("purity", 99.8 - rate * time + noise[i]),
            );
        }
    }
    let context = AnalysisContext::new(limits()).with_assays(vec!["purity".to_string()]);
    let analysis = analyze_study(records, &context).unwrap();

    let products: Vec<&str> = analysis
        .products
        .iter()
        .map(|product| product.product_id.as_str())
        .collect();
    assert_eq!(products, vec!["A", "B"]);
    for product in &analysis.products {
        assert_eq!(product.lot_ids, vec!["L1"]);
        let purity = &product.assays[0];
        assert!(!purity.is_failure(), "{purity:?}");
        assert_eq!(purity.grouping, Grouping::Pooled);
    }
    let slope = |index: usize| {
        analysis.products[index].assays[0]
            .projection
            .as_ref()
            .unwrap()
            .slope
    };
    assert!((slope(0) + 0.05).abs() < 0.01);
    assert!((slope(1) + 0.2).abs() < 0.01);
}
