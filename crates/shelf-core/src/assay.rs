//! Analysis of a single assay with failure isolation.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use shelf_model::{
    AnalysisOptions, FailureKind, Grouping, LotGroup, PoolabilityResult, ProjectionResult,
    SpecLimit,
};
use shelf_stats::{StatsError, project, test_poolability};
use tracing::{error, info_span, warn};

/// Reason reported when an assay fails outside the statistical taxonomy.
pub const UNEXPECTED_FAILURE_REASON: &str = "analysis failed unexpectedly";

/// Why an assay has no projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl From<&StatsError> for AssayFailure {
    fn from(error: &StatsError) -> Self {
        Self {
            kind: error.kind(),
            reason: error.reason(),
        }
    }
}

/// Everything computed for one assay of one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayOutcome {
    pub assay: String,
    pub spec_limit: SpecLimit,
    /// Lots with at least one measurement of this assay.
    pub lot_ids: Vec<String>,
    /// Absent when fewer than two lots carry data.
    pub poolability: Option<PoolabilityResult>,
    pub grouping: Grouping,
    pub projection: Option<ProjectionResult>,
    pub failure: Option<AssayFailure>,
}

impl AssayOutcome {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Projected shelf life, if the bound reaches the limit.
    pub fn shelf_life(&self) -> Option<f64> {
        self.projection
            .as_ref()
            .and_then(|projection| projection.projected_crossing_time)
    }

    fn unexpected(assay: &str, spec_limit: SpecLimit, lot_ids: Vec<String>) -> Self {
        Self {
            assay: assay.to_string(),
            spec_limit,
            lot_ids,
            poolability: None,
            grouping: Grouping::PerLot,
            projection: None,
            failure: Some(AssayFailure {
                kind: FailureKind::Unexpected,
                reason: UNEXPECTED_FAILURE_REASON.to_string(),
            }),
        }
    }
}

/// Runs the poolability test (with two or more lots), picks the grouping
/// and projects the shelf life.
///
/// Statistical failures are recorded on the outcome: a failed poolability
/// test yields a non-poolable result carrying the reason, a failed
/// projection leaves `projection` empty. A panic is caught and reported as
/// [`FailureKind::Unexpected`] without statistical detail.
pub fn analyze_assay(
    lots: &[LotGroup],
    assay: &str,
    spec_limit: &SpecLimit,
    options: &AnalysisOptions,
) -> AssayOutcome {
    let span = info_span!("assay", assay = %assay);
    let _guard = span.enter();

    let lot_ids: Vec<String> = lots
        .iter()
        .filter(|lot| !lot.points(assay).is_empty())
        .map(|lot| lot.lot_id().to_string())
        .collect();

    match catch_unwind(AssertUnwindSafe(|| {
        evaluate(lots, assay, spec_limit, options, lot_ids.clone())
    })) {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(assay, "assay analysis panicked");
            AssayOutcome::unexpected(assay, *spec_limit, lot_ids)
        }
    }
}

fn evaluate(
    lots: &[LotGroup],
    assay: &str,
    spec_limit: &SpecLimit,
    options: &AnalysisOptions,
    lot_ids: Vec<String>,
) -> AssayOutcome {
    let lot_count = lot_ids.len();
    let poolability = (lot_count >= 2).then(|| match test_poolability(lots, assay, options) {
        Ok(result) => result,
        Err(err) => {
            warn!(assay, kind = %err.kind(), reason = %err.reason(), "poolability test failed");
            let observations = lots.iter().map(|lot| lot.points(assay).len()).sum();
            PoolabilityResult::failed(assay, err.kind(), err.reason(), lot_count, observations)
        }
    });

    let grouping = Grouping::decide(lot_count, poolability.as_ref());
    let (projection, failure) = match project(lots, assay, grouping, spec_limit, options) {
        Ok(projection) => (Some(projection), None),
        Err(err) => {
            warn!(assay, kind = %err.kind(), reason = %err.reason(), "projection failed");
            (None, Some(AssayFailure::from(&err)))
        }
    };

    AssayOutcome {
        assay: assay.to_string(),
        spec_limit: *spec_limit,
        lot_ids,
        poolability,
        grouping,
        projection,
        failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_model::StabilityRecord;

    fn lot(lot_id: &str, series: &[(f64, f64)]) -> LotGroup {
        LotGroup::new(
            series
                .iter()
                .map(|&(t, v)| StabilityRecord::new("P", lot_id, t).with_assay("purity", v))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_lot_skips_poolability() {
        let lots = [lot("L1", &[(0.0, 99.5), (6.0, 99.2), (12.0, 98.95)])];
        let outcome = analyze_assay(
            &lots,
            "purity",
            &SpecLimit::lower(95.0),
            &AnalysisOptions::default(),
        );
        assert!(outcome.poolability.is_none());
        assert_eq!(outcome.grouping, Grouping::Pooled);
        assert!(outcome.projection.is_some());
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_failed_poolability_falls_back_to_per_lot() {
        let lots = [
            lot("L1", &[(0.0, 99.5), (6.0, 99.2), (12.0, 98.95)]),
            lot("L2", &[(0.0, 99.4), (0.0, 99.3)]),
        ];
        let outcome = analyze_assay(
            &lots,
            "purity",
            &SpecLimit::lower(95.0),
            &AnalysisOptions::default(),
        );
        let poolability = outcome.poolability.as_ref().unwrap();
        assert!(!poolability.poolable);
        assert!(poolability.p_value.is_none());
        assert_eq!(poolability.failure, Some(FailureKind::InsufficientData));
        assert!(poolability.reason.as_deref().unwrap().contains("L2"));
        assert_eq!(outcome.grouping, Grouping::PerLot);
        // L2 cannot be trended on its own either.
        assert!(outcome.projection.is_none());
        assert_eq!(
            outcome.failure.as_ref().map(|f| f.kind),
            Some(FailureKind::DegenerateFit)
        );
    }

    #[test]
    fn test_missing_assay_is_insufficient() {
        let lots = [lot("L1", &[(0.0, 99.5), (6.0, 99.2), (12.0, 98.95)])];
        let outcome = analyze_assay(
            &lots,
            "water",
            &SpecLimit::upper(1.0),
            &AnalysisOptions::default(),
        );
        assert!(outcome.lot_ids.is_empty());
        assert_eq!(
            outcome.failure.map(|f| f.kind),
            Some(FailureKind::InsufficientData)
        );
    }
}
