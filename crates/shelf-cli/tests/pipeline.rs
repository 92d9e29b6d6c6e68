//! Integration tests for the staged analysis run.

use std::path::{Path, PathBuf};

use shelf_cli::pipeline::{
    AnalysisRequest, OptionOverrides, list_assays, load_config, run_analysis,
};
use shelf_ingest::{
    AnalysisConfig, DEFAULT_MOCK_SEED, DEFAULT_TIME_COLUMN, generate_mock_study,
    write_stability_csv,
};
use shelf_model::{AnalysisOptions, BoundKind, Grouping, SpecLimit};
use tempfile::TempDir;

fn mock_csv(dir: &Path, time_column: &str) -> PathBuf {
    let path = dir.join("stability.csv");
    write_stability_csv(&path, &generate_mock_study(DEFAULT_MOCK_SEED), time_column).unwrap();
    path
}

fn request(data: PathBuf) -> AnalysisRequest {
    AnalysisRequest {
        data,
        ..AnalysisRequest::default()
    }
}

#[test]
fn test_mock_study_end_to_end() {
    let dir = TempDir::new().unwrap();
    let json = dir.path().join("report.json");
    let bands = dir.path().join("bands.csv");
    let run = run_analysis(&AnalysisRequest {
        json: Some(json.clone()),
        bands: Some(bands.clone()),
        ..request(mock_csv(dir.path(), DEFAULT_TIME_COLUMN))
    })
    .unwrap();

    assert_eq!(run.record_count, 21);
    assert!(!run.has_failures());
    let products: Vec<&str> = run
        .analysis
        .products
        .iter()
        .map(|product| product.product_id.as_str())
        .collect();
    assert_eq!(products, vec!["LOTA", "LOTB"]);
    for product in &run.analysis.products {
        let assays: Vec<&str> = product.assays.iter().map(|a| a.assay.as_str()).collect();
        assert_eq!(assays, vec!["main_impurity", "purity"]);
    }

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["generator"], "shelf");
    assert_eq!(value["time_column"], DEFAULT_TIME_COLUMN);
    assert!(value["source"].as_str().unwrap().ends_with("stability.csv"));

    // Header plus curve_points samples per trend.
    let band_lines = std::fs::read_to_string(&bands).unwrap().lines().count();
    assert_eq!(band_lines, run.band_rows + 1);
    assert!(run.band_rows >= 4 * AnalysisOptions::default().curve_points);
}

#[test]
fn test_single_lot_product_is_pooled() {
    let dir = TempDir::new().unwrap();
    let run = run_analysis(&AnalysisRequest {
        product: Some("LOTB".to_string()),
        assays: vec!["purity".to_string()],
        sequential: true,
        ..request(mock_csv(dir.path(), DEFAULT_TIME_COLUMN))
    })
    .unwrap();

    assert_eq!(run.analysis.products.len(), 1);
    let outcome = &run.analysis.products[0].assays[0];
    assert_eq!(outcome.assay, "purity");
    assert_eq!(outcome.grouping, Grouping::Pooled);
    assert!(outcome.poolability.is_none());
    assert!(outcome.projection.is_some());
}

#[test]
fn test_overrides_replace_configured_options() {
    let dir = TempDir::new().unwrap();
    let run = run_analysis(&AnalysisRequest {
        overrides: OptionOverrides {
            confidence: Some(0.99),
            bound: Some(BoundKind::Prediction),
            curve_points: Some(5),
            ..OptionOverrides::default()
        },
        ..request(mock_csv(dir.path(), DEFAULT_TIME_COLUMN))
    })
    .unwrap();

    assert_eq!(run.options.confidence, 0.99);
    assert_eq!(run.options.bound, BoundKind::Prediction);
    assert_eq!(run.options.significance, 0.05);
    let projection = run.analysis.products[0].assays[1].projection.as_ref().unwrap();
    assert_eq!(projection.confidence, 0.99);
    assert_eq!(projection.confidence_bound_curve.len(), 5);
}

#[test]
fn test_invalid_override_is_rejected() {
    let dir = TempDir::new().unwrap();
    let error = run_analysis(&AnalysisRequest {
        overrides: OptionOverrides {
            significance: Some(1.5),
            ..OptionOverrides::default()
        },
        ..request(mock_csv(dir.path(), DEFAULT_TIME_COLUMN))
    })
    .unwrap_err();
    assert!(format!("{error:#}").contains("significance"), "{error:#}");
}

#[test]
fn test_unconfigured_assay_is_rejected() {
    let dir = TempDir::new().unwrap();
    let error = run_analysis(&AnalysisRequest {
        assays: vec!["water".to_string()],
        ..request(mock_csv(dir.path(), DEFAULT_TIME_COLUMN))
    })
    .unwrap_err();
    assert!(format!("{error:#}").contains("water"), "{error:#}");
}

#[test]
fn test_config_file_sets_time_column_and_limits() {
    let dir = TempDir::new().unwrap();
    let data = mock_csv(dir.path(), "month");
    let mut config = AnalysisConfig::stability_defaults();
    config.analysis.time_column = "month".to_string();
    config.spec_limits.remove("main_impurity");
    let config_path = dir.path().join("stability.toml");
    std::fs::write(&config_path, config.to_toml_string().unwrap()).unwrap();

    let run = run_analysis(&AnalysisRequest {
        config: Some(config_path),
        ..request(data)
    })
    .unwrap();
    assert_eq!(run.time_column, "month");
    for product in &run.analysis.products {
        assert_eq!(product.assays.len(), 1);
        assert_eq!(product.assays[0].assay, "purity");
    }
}

#[test]
fn test_missing_data_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let error = run_analysis(&request(dir.path().join("absent.csv"))).unwrap_err();
    assert!(format!("{error:#}").contains("absent.csv"), "{error:#}");
}

#[test]
fn test_list_assays_reports_coverage_and_limits() {
    let dir = TempDir::new().unwrap();
    let data = mock_csv(dir.path(), DEFAULT_TIME_COLUMN);
    let config = load_config(None).unwrap();
    let columns = list_assays(&data, &config, DEFAULT_TIME_COLUMN).unwrap();

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["main_impurity", "purity"]);
    for column in &columns {
        assert_eq!(column.observations, 21);
        assert_eq!(column.lots, 3);
    }
    assert_eq!(columns[1].spec_limit, Some(SpecLimit::lower(98.0)));
}
