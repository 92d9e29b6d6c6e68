//! CSV export of fitted trends and their bounds for chart overlay.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use shelf_core::StudyAnalysis;
use tracing::info;

/// Column names of the band CSV, in order.
pub const BAND_COLUMNS: [&str; 10] = [
    "product_id",
    "assay",
    "trend",
    "grouping",
    "time",
    "fitted",
    "bound",
    "limit",
    "direction",
    "governing",
];

#[derive(Debug, Serialize)]
struct BandRow<'a> {
    product_id: &'a str,
    assay: &'a str,
    trend: &'a str,
    grouping: &'a str,
    time: f64,
    fitted: f64,
    bound: f64,
    limit: f64,
    direction: &'a str,
    governing: bool,
}

/// Writes one row per band sample of every projected trend and returns the
/// number of rows written. Assays without a projection contribute nothing.
pub fn write_band_csv(path: &Path, analysis: &StudyAnalysis) -> Result<usize> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    let mut rows = 0usize;

    for (product_id, outcome) in analysis.outcomes() {
        let Some(projection) = &outcome.projection else {
            continue;
        };
        for trend in &projection.trends {
            let governing = match &projection.governing_lot {
                Some(lot) => *lot == trend.label,
                None => true,
            };
            for point in &trend.curve {
                writer
                    .serialize(BandRow {
                        product_id,
                        assay: &outcome.assay,
                        trend: &trend.label,
                        grouping: projection.grouping.as_str(),
                        time: point.time,
                        fitted: point.fitted,
                        bound: point.bound,
                        limit: projection.spec_limit.value,
                        direction: projection.spec_limit.direction.as_str(),
                        governing,
                    })
                    .with_context(|| format!("write {}", path.display()))?;
                rows += 1;
            }
        }
    }

    if rows == 0 {
        writer
            .write_record(BAND_COLUMNS)
            .with_context(|| format!("write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    info!(path = %path.display(), rows, "Wrote band CSV");
    Ok(rows)
}
