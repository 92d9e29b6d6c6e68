//! Seeded synthetic stability study.
//!
//! Three lots over seven pull points, with lot `LOTA-002` degrading at twice
//! the rate of the others so that a poolability test has something to find.

use std::collections::BTreeSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shelf_model::StabilityRecord;
use tracing::info;

use crate::error::{IngestError, Result};
use crate::table::{LOT_COLUMN, PRODUCT_COLUMN};
use crate::value::format_numeric;

pub const MOCK_LOTS: [&str; 3] = ["LOTA-001", "LOTA-002", "LOTB-001"];
pub const MOCK_TIMEPOINTS: [f64; 7] = [0.0, 3.0, 6.0, 9.0, 12.0, 18.0, 24.0];
pub const DEFAULT_MOCK_SEED: u64 = 42;

const FAST_LOT: &str = "LOTA-002";

/// Generates purity and main impurity series for [`MOCK_LOTS`].
///
/// The product identifier is the lot prefix (`LOTA`, `LOTB`). Identical
/// seeds give identical studies.
pub fn generate_mock_study(seed: u64) -> Vec<StabilityRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(MOCK_LOTS.len() * MOCK_TIMEPOINTS.len());
    for lot in MOCK_LOTS {
        let product = lot.split('-').next().unwrap_or(lot);
        let initial_purity = rng.random_range(99.5..99.9);
        let mut rate = rng.random_range(0.04..0.08);
        if lot == FAST_LOT {
            rate *= 2.0;
        }
        for time in MOCK_TIMEPOINTS {
            let purity = round_to(initial_purity - rate * time + normal(&mut rng, 0.1), 2);
            let impurity = round_to(0.1 + rate * time / 2.0 + normal(&mut rng, 0.05), 3);
            records.push(
                StabilityRecord::new(product, lot, time)
                    .with_assay("purity", purity)
                    .with_assay("main_impurity", impurity),
            );
        }
    }
    info!(seed, records = records.len(), "Generated synthetic stability study");
    records
}

/// Writes records as a stability table that [`crate::read_stability_table`]
/// reads back.
pub fn write_stability_csv(path: &Path, records: &[StabilityRecord], time_column: &str) -> Result<()> {
    let assays: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.assay_values.keys().map(String::as_str))
        .collect();
    let csv_err = |source| IngestError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    let mut header = vec![PRODUCT_COLUMN, LOT_COLUMN, time_column];
    header.extend(assays.iter().copied());
    writer.write_record(&header).map_err(csv_err)?;

    for record in records {
        let mut row = vec![
            record.product_id.clone(),
            record.lot_id.clone(),
            format_numeric(record.timepoint),
        ];
        row.extend(
            assays
                .iter()
                .map(|assay| record.value(assay).map(format_numeric).unwrap_or_default()),
        );
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| IngestError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Box-Muller draw from `N(0, sd^2)`.
fn normal(rng: &mut StdRng, sd: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random::<f64>();
    sd * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_study() {
        assert_eq!(generate_mock_study(7), generate_mock_study(7));
        assert_ne!(generate_mock_study(7), generate_mock_study(8));
    }

    #[test]
    fn test_study_shape() {
        let records = generate_mock_study(DEFAULT_MOCK_SEED);
        assert_eq!(records.len(), 21);
        assert!(records.iter().all(|r| r.value("purity").is_some()));
        assert!(records.iter().all(|r| r.value("main_impurity").is_some()));
        let products: BTreeSet<&str> = records.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(products.into_iter().collect::<Vec<_>>(), vec!["LOTA", "LOTB"]);
    }

    #[test]
    fn test_fast_lot_usually_loses_more_purity() {
        let loss = |records: &[StabilityRecord], lot: &str| {
            let series: Vec<f64> = records
                .iter()
                .filter(|r| r.lot_id == lot)
                .filter_map(|r| r.value("purity"))
                .collect();
            series[0] - series[series.len() - 1]
        };
        let faster = (0..20u64)
            .filter(|&seed| {
                let records = generate_mock_study(seed);
                loss(&records, "LOTA-002") > loss(&records, "LOTA-001")
            })
            .count();
        assert!(faster >= 15, "fast lot lost more purity in only {faster}/20 studies");
    }
}
