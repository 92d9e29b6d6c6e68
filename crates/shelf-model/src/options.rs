//! Tunable constants of the stability analysis.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Slopes are declared homogeneous when the interaction p-value exceeds this.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;
/// One-sided level of the bound used for shelf-life estimation.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;
/// Extrapolation horizon as a multiple of the observed time span.
pub const DEFAULT_HORIZON_FACTOR: f64 = 10.0;
/// Number of samples in each reported band curve.
pub const DEFAULT_CURVE_POINTS: usize = 50;

/// Kind of one-sided bound placed around the fitted trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    /// Bound on the mean trend (ICH Q1E shelf-life estimation).
    #[default]
    Confidence,
    /// Bound on a single future observation.
    Prediction,
}

/// Options shared by the poolability test and the projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub significance: f64,
    pub confidence: f64,
    pub horizon_factor: f64,
    pub bound: BoundKind,
    pub curve_points: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            significance: DEFAULT_SIGNIFICANCE,
            confidence: DEFAULT_CONFIDENCE,
            horizon_factor: DEFAULT_HORIZON_FACTOR,
            bound: BoundKind::default(),
            curve_points: DEFAULT_CURVE_POINTS,
        }
    }
}

impl AnalysisOptions {
    #[must_use]
    pub fn with_significance(mut self, significance: f64) -> Self {
        self.significance = significance;
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    #[must_use]
    pub fn with_horizon_factor(mut self, factor: f64) -> Self {
        self.horizon_factor = factor;
        self
    }

    #[must_use]
    pub fn with_bound(mut self, bound: BoundKind) -> Self {
        self.bound = bound;
        self
    }

    #[must_use]
    pub fn with_curve_points(mut self, points: usize) -> Self {
        self.curve_points = points;
        self
    }

    /// Checks every option is inside its meaningful range.
    pub fn validate(&self) -> Result<()> {
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(ModelError::InvalidOption {
                name: "significance",
                reason: format!("{} is not in (0, 1)", self.significance),
            });
        }
        if !(self.confidence >= 0.5 && self.confidence < 1.0) {
            return Err(ModelError::InvalidOption {
                name: "confidence",
                reason: format!("{} is not in [0.5, 1)", self.confidence),
            });
        }
        if !(self.horizon_factor.is_finite() && self.horizon_factor >= 1.0) {
            return Err(ModelError::InvalidOption {
                name: "horizon_factor",
                reason: format!("{} must be a finite value >= 1", self.horizon_factor),
            });
        }
        if self.curve_points < 2 {
            return Err(ModelError::InvalidOption {
                name: "curve_points",
                reason: format!("{} must be at least 2", self.curve_points),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AnalysisOptions::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let options = AnalysisOptions::default().with_confidence(1.0);
        assert!(matches!(
            options.validate(),
            Err(ModelError::InvalidOption {
                name: "confidence",
                ..
            })
        ));
        let options = AnalysisOptions::default().with_significance(0.0);
        assert!(options.validate().is_err());
        let options = AnalysisOptions::default().with_horizon_factor(0.5);
        assert!(options.validate().is_err());
        let options = AnalysisOptions::default().with_curve_points(1);
        assert!(options.validate().is_err());
    }
}
