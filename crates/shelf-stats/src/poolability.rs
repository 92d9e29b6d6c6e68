//! ANCOVA slope-homogeneity test across lots.
//!
//! Compares a reduced model with one common slope and per-lot intercepts
//! (`value ~ time + lot`) against a full model that also gives every lot its
//! own slope (`value ~ time + lot + time:lot`). Both are fitted by generic
//! least squares over a dummy-coded design, so the degrees of freedom follow
//! from the design for any number of lots.

use std::collections::BTreeMap;

use shelf_model::{AnalysisOptions, LotGroup, PoolabilityResult};
use tracing::debug;

use crate::distribution::FisherSnedecor;
use crate::error::{Result, StatsError};
use crate::linalg::{DesignMatrix, least_squares};

/// Residual degrees of freedom the full model must retain.
pub const MIN_RESIDUAL_DF: usize = 2;

/// Full-model residual sums of squares below this fraction of the total sum
/// of squares count as a zero residual variance.
const ZERO_RSS_RATIO: f64 = 1e-24;

pub const POOLABLE_REASON: &str = "Slopes are not significantly different.";
pub const NOT_POOLABLE_REASON: &str = "Slopes are significantly different.";

/// Tests whether the lots' degradation slopes for `assay` are homogeneous.
///
/// Rows are arranged by lot identifier, then time and value, before the
/// designs are built, so the statistic does not depend on input ordering.
///
/// # Errors
///
/// - [`StatsError::InsufficientData`] with fewer than two lots, a lot with
///   fewer than two distinct timepoints, or fewer than [`MIN_RESIDUAL_DF`]
///   residual degrees of freedom in the full model.
/// - [`StatsError::DegenerateFit`] if either design is singular.
/// - [`StatsError::NumericInstability`] if the full model leaves no residual
///   variance or the F statistic is not finite.
pub fn test_poolability(
    lots: &[LotGroup],
    assay: &str,
    options: &AnalysisOptions,
) -> Result<PoolabilityResult> {
    options.validate()?;

    let mut by_lot: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for lot in lots {
        let points = lot.points(assay);
        if !points.is_empty() {
            by_lot.entry(lot.lot_id()).or_default().extend(points);
        }
    }
    for points in by_lot.values_mut() {
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    }

    let lot_count = by_lot.len();
    if lot_count < 2 {
        return Err(StatsError::insufficient(format!(
            "poolability needs at least 2 lots with data for {assay}, got {lot_count}"
        )));
    }
    for (lot_id, points) in &by_lot {
        let distinct = distinct_times(points);
        if distinct < 2 {
            return Err(StatsError::insufficient(format!(
                "lot {lot_id} has {distinct} distinct timepoint(s) for {assay}; at least 2 are required"
            )));
        }
    }

    let observations: Vec<(usize, f64, f64)> = by_lot
        .values()
        .enumerate()
        .flat_map(|(index, points)| points.iter().map(move |&(t, v)| (index, t, v)))
        .collect();
    let n = observations.len();
    let reduced_params = lot_count + 1;
    let full_params = 2 * lot_count;
    if n < full_params + MIN_RESIDUAL_DF {
        return Err(StatsError::insufficient(format!(
            "{n} observations across {lot_count} lots leave {} residual degree(s) of freedom; at least {MIN_RESIDUAL_DF} are required",
            n.saturating_sub(full_params)
        )));
    }

    // Centre time to keep intercept and slope columns well conditioned.
    let mean_time = observations.iter().map(|(_, t, _)| t).sum::<f64>() / n as f64;
    let mean_value = observations.iter().map(|(_, _, v)| v).sum::<f64>() / n as f64;
    let response: Vec<f64> = observations.iter().map(|(_, _, v)| *v).collect();

    let mut reduced = DesignMatrix::with_columns(reduced_params);
    let mut full = DesignMatrix::with_columns(full_params);
    let mut row = Vec::with_capacity(full_params);
    for &(lot_index, time, _) in &observations {
        let centred = time - mean_time;
        row.clear();
        row.push(1.0);
        row.push(centred);
        // Lot 0 is the reference level.
        for level in 1..lot_count {
            row.push(if lot_index == level { 1.0 } else { 0.0 });
        }
        reduced.push_row(&row);
        for level in 1..lot_count {
            row.push(if lot_index == level { centred } else { 0.0 });
        }
        full.push_row(&row);
    }

    let reduced_fit = least_squares(&reduced, &response, None)?;
    let full_fit = least_squares(&full, &response, None)?;

    let total_ss: f64 = response.iter().map(|v| (v - mean_value).powi(2)).sum();
    let rss_reduced = reduced_fit.residual_sum_of_squares;
    let rss_full = full_fit.residual_sum_of_squares;
    if rss_full <= ZERO_RSS_RATIO * total_ss || total_ss == 0.0 {
        return Err(StatsError::unstable(
            "full model leaves zero residual variance; the F statistic is undefined",
        ));
    }

    let df_numerator = full_params - reduced_params;
    let df_denominator = full_fit.degrees_of_freedom;
    let numerator = (rss_reduced - rss_full).max(0.0) / df_numerator as f64;
    let denominator = rss_full / df_denominator as f64;
    let f_statistic = numerator / denominator;
    if !f_statistic.is_finite() {
        return Err(StatsError::unstable(format!(
            "F statistic is not finite (numerator {numerator}, denominator {denominator})"
        )));
    }

    let p_value = FisherSnedecor::new(df_numerator, df_denominator)?.sf(f_statistic);
    if !(0.0..=1.0).contains(&p_value) {
        return Err(StatsError::unstable(format!(
            "p-value {p_value} is outside [0, 1]"
        )));
    }

    let poolable = p_value > options.significance;
    debug!(
        assay,
        lot_count,
        observations = n,
        f_statistic,
        df_numerator,
        df_denominator,
        p_value,
        poolable,
        "poolability test"
    );

    Ok(PoolabilityResult {
        assay: assay.to_string(),
        p_value: Some(p_value),
        f_statistic: Some(f_statistic),
        df_numerator: Some(df_numerator),
        df_denominator: Some(df_denominator),
        lot_count,
        observation_count: n,
        poolable,
        reason: Some(
            if poolable {
                POOLABLE_REASON
            } else {
                NOT_POOLABLE_REASON
            }
            .to_string(),
        ),
        failure: None,
    })
}

fn distinct_times(sorted: &[(f64, f64)]) -> usize {
    let mut distinct = 0usize;
    let mut last: Option<f64> = None;
    for &(time, _) in sorted {
        if last != Some(time) {
            distinct += 1;
            last = Some(time);
        }
    }
    distinct
}
