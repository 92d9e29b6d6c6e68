//! Error taxonomy of the statistical core.

use shelf_model::{FailureKind, ModelError};
use thiserror::Error;

/// Failures of a single statistical computation.
///
/// Every variant is recoverable per assay: callers convert it into a result
/// object carrying the reason instead of aborting sibling assays.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatsError {
    /// Too few points or groups to fit a meaningful model.
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// The model is mathematically undefined (zero time variance, singular
    /// design matrix).
    #[error("degenerate fit: {reason}")]
    DegenerateFit { reason: String },

    /// An intermediate value was non-finite or divided by a zero variance.
    #[error("numeric instability: {reason}")]
    NumericInstability { reason: String },

    /// Options or limits handed to the engine are out of range.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ModelError),
}

impl StatsError {
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }

    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateFit {
            reason: reason.into(),
        }
    }

    pub fn unstable(reason: impl Into<String>) -> Self {
        Self::NumericInstability {
            reason: reason.into(),
        }
    }

    /// Serialisable classification used on result objects.
    pub fn kind(&self) -> FailureKind {
        match self {
            StatsError::InsufficientData { .. } => FailureKind::InsufficientData,
            StatsError::DegenerateFit { .. } => FailureKind::DegenerateFit,
            StatsError::NumericInstability { .. } => FailureKind::NumericInstability,
            StatsError::InvalidInput(_) => FailureKind::Unexpected,
        }
    }

    /// Human-readable reason without the category prefix.
    pub fn reason(&self) -> String {
        match self {
            StatsError::InsufficientData { reason }
            | StatsError::DegenerateFit { reason }
            | StatsError::NumericInstability { reason } => reason.clone(),
            StatsError::InvalidInput(error) => error.to_string(),
        }
    }

    /// Prefixes the reason, e.g. with the lot whose fit failed.
    #[must_use]
    pub fn context(self, prefix: &str) -> Self {
        match self {
            StatsError::InsufficientData { reason } => {
                Self::insufficient(format!("{prefix}: {reason}"))
            }
            StatsError::DegenerateFit { reason } => Self::degenerate(format!("{prefix}: {reason}")),
            StatsError::NumericInstability { reason } => {
                Self::unstable(format!("{prefix}: {reason}"))
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_prefixes_reason_and_keeps_kind() {
        let error = StatsError::degenerate("all timepoints identical").context("lot L1");
        assert_eq!(error.kind(), FailureKind::DegenerateFit);
        assert_eq!(error.reason(), "lot L1: all timepoints identical");
        assert_eq!(
            error.to_string(),
            "degenerate fit: lot L1: all timepoints identical"
        );
    }

    #[test]
    fn test_invalid_input_is_cloneable() {
        let error = StatsError::from(ModelError::InvalidOption {
            name: "confidence",
            reason: "1.2 is not in [0.5, 1)".to_string(),
        });
        let copy = error.clone();
        assert_eq!(copy, error);
        assert_eq!(copy.kind(), FailureKind::Unexpected);
        assert_eq!(
            copy.reason(),
            "invalid analysis option confidence: 1.2 is not in [0.5, 1)"
        );
    }
}
