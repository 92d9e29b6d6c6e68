//! Display strings for the presentation layer.

use shelf_core::AssayOutcome;
use shelf_model::PoolabilityResult;

/// Shown when the bound stays inside specification up to the horizon.
pub const NOT_REACHED: &str = "not reached";
/// Shown for a statistic that could not be computed.
pub const NOT_AVAILABLE: &str = "n/a";

/// P-value rounded to three decimals; values below 0.001 read `<0.001`.
pub fn format_p_value(p_value: Option<f64>) -> String {
    match p_value {
        None => NOT_AVAILABLE.to_string(),
        Some(p) if !p.is_finite() => NOT_AVAILABLE.to_string(),
        Some(p) if p < 0.001 => "<0.001".to_string(),
        Some(p) => format!("{p:.3}"),
    }
}

/// Projected shelf life with one decimal, or [`NOT_REACHED`].
pub fn format_shelf_life(crossing_time: Option<f64>) -> String {
    match crossing_time {
        Some(time) if time.is_finite() => format!("{time:.1}"),
        _ => NOT_REACHED.to_string(),
    }
}

/// Pass/fail label of a poolability result.
pub fn format_poolability(result: Option<&PoolabilityResult>) -> &'static str {
    match result {
        None => "single lot",
        Some(result) if result.is_failure() => "test failed",
        Some(result) if result.poolable => "poolable",
        Some(_) => "not poolable",
    }
}

/// Slope with four significant decimals.
pub fn format_slope(slope: f64) -> String {
    format!("{slope:+.4}")
}

/// One line per assay for summary tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub product_id: String,
    pub assay: String,
    pub lots: usize,
    pub p_value: String,
    pub poolability: &'static str,
    pub grouping: &'static str,
    pub slope: String,
    pub shelf_life: String,
    /// Governing lot, out-of-spec flag or failure reason.
    pub note: String,
}

impl SummaryRow {
    pub fn from_outcome(product_id: &str, outcome: &AssayOutcome) -> Self {
        let projection = outcome.projection.as_ref();
        let note = if let Some(failure) = &outcome.failure {
            format!("{}: {}", failure.kind, failure.reason)
        } else if projection.is_some_and(|p| p.already_out_of_spec) {
            "already out of specification".to_string()
        } else if let Some(lot) = projection.and_then(|p| p.governing_lot.as_deref()) {
            format!("governed by {lot}")
        } else if let Some(reason) = outcome
            .poolability
            .as_ref()
            .filter(|result| result.is_failure())
            .and_then(|result| result.reason.as_deref())
        {
            reason.to_string()
        } else {
            String::new()
        };

        Self {
            product_id: product_id.to_string(),
            assay: outcome.assay.clone(),
            lots: outcome.lot_ids.len(),
            p_value: format_p_value(outcome.poolability.as_ref().and_then(|r| r.p_value)),
            poolability: format_poolability(outcome.poolability.as_ref()),
            grouping: outcome.grouping.as_str(),
            slope: projection.map_or_else(|| NOT_AVAILABLE.to_string(), |p| format_slope(p.slope)),
            shelf_life: format_shelf_life(outcome.shelf_life()),
            note,
        }
    }
}
