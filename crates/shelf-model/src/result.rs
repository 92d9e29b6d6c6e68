//! Result objects handed to the presentation layer.
//!
//! Every result is computed fresh from its inputs and replaced wholesale on
//! the next run; nothing here is updated in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::BoundKind;
use crate::spec_limit::SpecLimit;

/// Why an analysis step could not produce a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientData,
    DegenerateFit,
    NumericInstability,
    /// Unclassified failure; reported without statistical detail.
    Unexpected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InsufficientData => "insufficient data",
            FailureKind::DegenerateFit => "degenerate fit",
            FailureKind::NumericInstability => "numeric instability",
            FailureKind::Unexpected => "unexpected failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How lots are combined when trending an assay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grouping {
    /// One trend over all selected lots.
    Pooled,
    /// One trend per lot; the shortest shelf life governs.
    PerLot,
}

impl Grouping {
    /// Picks the grouping from the lot count and the poolability outcome.
    ///
    /// A single lot is trivially pooled. With two or more lots the data are
    /// pooled only when the test ran and found the slopes homogeneous; a
    /// missing or failed test falls back to per-lot trending.
    pub fn decide(lot_count: usize, poolability: Option<&PoolabilityResult>) -> Self {
        if lot_count <= 1 {
            return Grouping::Pooled;
        }
        match poolability {
            Some(result) if result.poolable => Grouping::Pooled,
            _ => Grouping::PerLot,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grouping::Pooled => "pooled",
            Grouping::PerLot => "per-lot",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the slope-homogeneity (ANCOVA) test for one assay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolabilityResult {
    pub assay: String,
    /// Interaction p-value; absent when the test could not run.
    pub p_value: Option<f64>,
    pub f_statistic: Option<f64>,
    pub df_numerator: Option<usize>,
    pub df_denominator: Option<usize>,
    pub lot_count: usize,
    pub observation_count: usize,
    pub poolable: bool,
    pub reason: Option<String>,
    pub failure: Option<FailureKind>,
}

impl PoolabilityResult {
    /// Conservative result for a test that could not be completed.
    pub fn failed(
        assay: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
        lot_count: usize,
        observation_count: usize,
    ) -> Self {
        Self {
            assay: assay.into(),
            p_value: None,
            f_statistic: None,
            df_numerator: None,
            df_denominator: None,
            lot_count,
            observation_count,
            poolable: false,
            reason: Some(reason.into()),
            failure: Some(kind),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Ordinary least-squares line `value = intercept + slope * time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
    pub residual_sum_of_squares: f64,
    pub degrees_of_freedom: usize,
    pub n: usize,
    pub mean_time: f64,
    /// Sum of squared time deviations from `mean_time`.
    pub sxx: f64,
    pub r_squared: f64,
    /// Standard error of the slope; absent without residual degrees of freedom.
    pub slope_std_error: Option<f64>,
    pub time_min: f64,
    pub time_max: f64,
}

impl TrendFit {
    pub fn predict(&self, time: f64) -> f64 {
        self.intercept + self.slope * time
    }

    /// Residual variance `RSS / df`, absent when `df == 0`.
    pub fn residual_variance(&self) -> Option<f64> {
        if self.degrees_of_freedom == 0 {
            None
        } else {
            Some(self.residual_sum_of_squares / self.degrees_of_freedom as f64)
        }
    }

    pub fn time_span(&self) -> f64 {
        self.time_max - self.time_min
    }
}

/// One sample of a fitted trend and its one-sided bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub time: f64,
    pub fitted: f64,
    pub bound: f64,
}

/// Projection of a single fitted trend (the pooled data or one lot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendProjection {
    /// Lot identifier, or `pooled` for the pooled trend.
    pub label: String,
    pub lot_ids: Vec<String>,
    pub fit: TrendFit,
    pub curve: Vec<BandPoint>,
    pub crossing_time: Option<f64>,
    pub already_out_of_spec: bool,
}

/// Shelf-life projection for one assay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub assay: String,
    pub grouping: Grouping,
    pub spec_limit: SpecLimit,
    pub confidence: f64,
    pub bound: BoundKind,
    /// Slope of the governing trend.
    pub slope: f64,
    /// Intercept of the governing trend.
    pub intercept: f64,
    pub confidence_bound_curve: Vec<BandPoint>,
    /// Earliest time the bound reaches the limit; absent when the limit is
    /// not reached inside the extrapolation horizon.
    pub projected_crossing_time: Option<f64>,
    pub horizon: f64,
    /// Lot that determines the shelf life in per-lot mode.
    pub governing_lot: Option<String>,
    pub already_out_of_spec: bool,
    pub trends: Vec<TrendProjection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(poolable: bool) -> PoolabilityResult {
        PoolabilityResult {
            assay: "purity".to_string(),
            p_value: Some(if poolable { 0.4 } else { 0.01 }),
            f_statistic: Some(1.0),
            df_numerator: Some(1),
            df_denominator: Some(2),
            lot_count: 2,
            observation_count: 6,
            poolable,
            reason: None,
            failure: None,
        }
    }

    #[test]
    fn test_grouping_follows_poolability() {
        assert_eq!(Grouping::decide(1, None), Grouping::Pooled);
        assert_eq!(Grouping::decide(2, None), Grouping::PerLot);
        assert_eq!(Grouping::decide(3, Some(&passing(true))), Grouping::Pooled);
        assert_eq!(Grouping::decide(3, Some(&passing(false))), Grouping::PerLot);
    }

    #[test]
    fn test_failed_result_is_never_poolable() {
        let result =
            PoolabilityResult::failed("purity", FailureKind::InsufficientData, "one lot", 1, 3);
        assert!(!result.poolable);
        assert!(result.p_value.is_none());
        assert_eq!(Grouping::decide(2, Some(&result)), Grouping::PerLot);
    }

    #[test]
    fn test_residual_variance_requires_degrees_of_freedom() {
        let fit = TrendFit {
            slope: 1.0,
            intercept: 0.0,
            residual_sum_of_squares: 2.0,
            degrees_of_freedom: 0,
            n: 2,
            mean_time: 0.5,
            sxx: 0.5,
            r_squared: 1.0,
            slope_std_error: None,
            time_min: 0.0,
            time_max: 1.0,
        };
        assert_eq!(fit.residual_variance(), None);
        assert_eq!(fit.predict(2.0), 2.0);
    }
}
