//! Shelf-life projection from a fitted trend and its one-sided bound.
//!
//! The bound at time `t` is
//!
//! ```text
//! fitted(t) ± t_{conf, df} · s · sqrt(k + 1/n + (t - t̄)² / Sxx)
//! ```
//!
//! with `k = 0` for a confidence bound on the mean and `k = 1` for a
//! prediction bound. The side (`+` or `-`) is the one facing the limit. The
//! distance from that bound to the limit is concave in `t`, so once the bound
//! reaches the limit it stays there; the crossing is found by bisection
//! between the trend's first observation and the extrapolation horizon.
//! The bound is never searched before the first observation.

use shelf_model::{
    AnalysisOptions, BandPoint, BoundKind, Grouping, LimitDirection, LotGroup, ProjectionResult,
    SpecLimit, TrendFit, TrendProjection,
};
use tracing::{debug, warn};

use crate::distribution::StudentT;
use crate::error::{Result, StatsError};
use crate::trend::TrendModel;

/// Label of the trend fitted to all lots together.
pub const POOLED_LABEL: &str = "pooled";

const BISECTION_MAX_ITERATIONS: usize = 200;

/// Projects the shelf life of `assay` against `spec_limit`.
///
/// With [`Grouping::Pooled`] one trend is fitted over every lot's points.
/// With [`Grouping::PerLot`] each lot gets its own trend and the earliest
/// crossing across lots is reported. A lot whose trend cannot be fitted
/// fails the whole projection, since the remaining lots alone could
/// overstate the shelf life.
pub fn project(
    lots: &[LotGroup],
    assay: &str,
    grouping: Grouping,
    spec_limit: &SpecLimit,
    options: &AnalysisOptions,
) -> Result<ProjectionResult> {
    options.validate()?;
    spec_limit.validate(assay)?;

    let groups = trend_inputs(lots, assay, grouping);
    if groups.is_empty() {
        return Err(StatsError::insufficient(format!(
            "no lot has observations for {assay}"
        )));
    }

    let (time_min, time_max) = groups
        .iter()
        .flat_map(|group| group.points.iter().map(|(t, _)| *t))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
    let span = time_max - time_min;
    if !(span > 0.0) {
        return Err(StatsError::degenerate(format!(
            "observations for {assay} cover a single timepoint"
        )));
    }
    let horizon = time_min + options.horizon_factor * span;

    let mut trends = Vec::with_capacity(groups.len());
    for group in groups {
        let trend = project_trend(&group, spec_limit, options, horizon).map_err(|error| {
            if grouping == Grouping::PerLot {
                error.context(&format!("lot {}", group.label))
            } else {
                error
            }
        })?;
        trends.push(trend);
    }

    let governing = governing_index(&trends, spec_limit, horizon);
    let projected_crossing_time = trends
        .iter()
        .filter_map(|trend| trend.projection.crossing_time)
        .reduce(f64::min);
    let already_out_of_spec = trends
        .iter()
        .any(|trend| trend.projection.already_out_of_spec);
    let governing_trend = &trends[governing];
    let governing_lot = match grouping {
        Grouping::PerLot => Some(governing_trend.projection.label.clone()),
        Grouping::Pooled => None,
    };

    if already_out_of_spec {
        warn!(assay, "latest observation is already out of specification");
    }
    debug!(
        assay,
        grouping = %grouping,
        horizon,
        crossing = ?projected_crossing_time,
        governing = ?governing_lot,
        "projection complete"
    );

    Ok(ProjectionResult {
        assay: assay.to_string(),
        grouping,
        spec_limit: *spec_limit,
        confidence: options.confidence,
        bound: options.bound,
        slope: governing_trend.projection.fit.slope,
        intercept: governing_trend.projection.fit.intercept,
        confidence_bound_curve: governing_trend.projection.curve.clone(),
        projected_crossing_time,
        horizon,
        governing_lot,
        already_out_of_spec,
        trends: trends.into_iter().map(|trend| trend.projection).collect(),
    })
}

/// Fitted trend plus the bound parameters needed to evaluate it anywhere.
#[derive(Debug, Clone, Copy)]
pub struct TrendBound {
    fit: TrendFit,
    critical_value: f64,
    residual_sd: f64,
    extra_variance: f64,
    direction: LimitDirection,
}

impl TrendBound {
    /// Prepares the one-sided bound of `fit` facing `direction`.
    pub fn new(fit: TrendFit, direction: LimitDirection, options: &AnalysisOptions) -> Result<Self> {
        let variance = fit.residual_variance().ok_or_else(|| {
            StatsError::insufficient(format!(
                "a confidence bound needs at least 3 observations, got {}",
                fit.n
            ))
        })?;
        let critical_value = StudentT::new(fit.degrees_of_freedom)?.quantile(options.confidence)?;
        let residual_sd = variance.max(0.0).sqrt();
        if !critical_value.is_finite() || !residual_sd.is_finite() {
            return Err(StatsError::unstable("bound parameters are not finite"));
        }
        let extra_variance = match options.bound {
            BoundKind::Confidence => 0.0,
            BoundKind::Prediction => 1.0,
        };
        Ok(Self {
            fit,
            critical_value,
            residual_sd,
            extra_variance,
            direction,
        })
    }

    pub fn fit(&self) -> &TrendFit {
        &self.fit
    }

    /// Half-width of the one-sided band at `time`.
    pub fn half_width(&self, time: f64) -> f64 {
        let offset = time - self.fit.mean_time;
        let leverage = self.extra_variance + 1.0 / self.fit.n as f64 + offset * offset / self.fit.sxx;
        self.critical_value * self.residual_sd * leverage.sqrt()
    }

    /// Bound value at `time` on the side facing the limit.
    pub fn bound(&self, time: f64) -> f64 {
        let fitted = self.fit.predict(time);
        match self.direction {
            LimitDirection::Upper => fitted + self.half_width(time),
            LimitDirection::Lower => fitted - self.half_width(time),
        }
    }

    pub fn band_point(&self, time: f64) -> BandPoint {
        BandPoint {
            time,
            fitted: self.fit.predict(time),
            bound: self.bound(time),
        }
    }

    /// Earliest time in `[start, horizon]` at which the bound reaches the
    /// limit, or `None` if it stays inside specification up to the horizon.
    pub fn crossing_time(&self, limit: &SpecLimit, start: f64, horizon: f64) -> Option<f64> {
        if !(horizon > start) {
            return None;
        }
        let margin = |time: f64| limit.margin(self.bound(time));
        if margin(start) <= 0.0 {
            return Some(start);
        }
        if margin(horizon) > 0.0 {
            return None;
        }
        let mut lo = start;
        let mut hi = horizon;
        for _ in 0..BISECTION_MAX_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if margin(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= 1e-12 * hi.abs().max(1.0) {
                break;
            }
        }
        Some(hi)
    }

    /// Evenly spaced band samples from `start` to `end` inclusive.
    pub fn curve(&self, start: f64, end: f64, points: usize) -> Vec<BandPoint> {
        let points = points.max(2);
        let step = (end - start) / (points - 1) as f64;
        (0..points)
            .map(|i| {
                let time = if i == points - 1 {
                    end
                } else {
                    start + step * i as f64
                };
                self.band_point(time)
            })
            .collect()
    }
}

struct TrendInput {
    label: String,
    lot_ids: Vec<String>,
    points: Vec<(f64, f64)>,
}

struct ProjectedTrend {
    bound: TrendBound,
    projection: TrendProjection,
}

fn trend_inputs(lots: &[LotGroup], assay: &str, grouping: Grouping) -> Vec<TrendInput> {
    let mut ordered: Vec<&LotGroup> = lots.iter().collect();
    ordered.sort_by(|a, b| a.lot_id().cmp(b.lot_id()));
    match grouping {
        Grouping::Pooled => {
            let mut points: Vec<(f64, f64)> = Vec::new();
            let mut lot_ids: Vec<String> = Vec::new();
            for lot in ordered {
                let lot_points = lot.points(assay);
                if lot_points.is_empty() {
                    continue;
                }
                points.extend(lot_points);
                if !lot_ids.iter().any(|id| id == lot.lot_id()) {
                    lot_ids.push(lot.lot_id().to_string());
                }
            }
            if points.is_empty() {
                return Vec::new();
            }
            points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
            vec![TrendInput {
                label: POOLED_LABEL.to_string(),
                lot_ids,
                points,
            }]
        }
        Grouping::PerLot => {
            let mut inputs: Vec<TrendInput> = Vec::new();
            for lot in ordered {
                let lot_points = lot.points(assay);
                if lot_points.is_empty() {
                    continue;
                }
                match inputs.last_mut() {
                    Some(last) if last.label == lot.lot_id() => {
                        last.points.extend(lot_points);
                        last.points
                            .sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                    }
                    _ => inputs.push(TrendInput {
                        label: lot.lot_id().to_string(),
                        lot_ids: vec![lot.lot_id().to_string()],
                        points: lot_points,
                    }),
                }
            }
            inputs
        }
    }
}

fn project_trend(
    input: &TrendInput,
    limit: &SpecLimit,
    options: &AnalysisOptions,
    horizon: f64,
) -> Result<ProjectedTrend> {
    let fit = TrendModel::fit(&input.points)?;
    let bound = TrendBound::new(fit, limit.direction, options)?;

    let mut crossing_time = bound.crossing_time(limit, fit.time_min, horizon);

    // Never extrapolate past a limit the data already breach.
    let latest = fit.time_max;
    let already_out_of_spec = input
        .points
        .iter()
        .filter(|(time, _)| *time == latest)
        .any(|(_, value)| limit.is_violated_by(*value));
    if already_out_of_spec {
        crossing_time = Some(crossing_time.map_or(latest, |time| time.min(latest)));
    }

    let curve_end = crossing_time.map_or(fit.time_max, |time| time.max(fit.time_max));
    let curve = bound.curve(fit.time_min, curve_end, options.curve_points);

    Ok(ProjectedTrend {
        bound,
        projection: TrendProjection {
            label: input.label.clone(),
            lot_ids: input.lot_ids.clone(),
            fit,
            curve,
            crossing_time,
            already_out_of_spec,
        },
    })
}

/// Index of the trend that determines the shelf life: the earliest
/// crossing, or without any crossing the trend closest to the limit at the
/// horizon. Ties keep lot order.
fn governing_index(trends: &[ProjectedTrend], limit: &SpecLimit, horizon: f64) -> usize {
    let mut best = 0usize;
    let mut best_key = (f64::INFINITY, f64::INFINITY);
    for (index, trend) in trends.iter().enumerate() {
        let key = match trend.projection.crossing_time {
            Some(time) => (time, f64::NEG_INFINITY),
            None => (f64::INFINITY, limit.margin(trend.bound.bound(horizon))),
        };
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best = index;
            best_key = key;
        }
    }
    best
}
