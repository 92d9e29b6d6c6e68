//! Ordinary least-squares trend of assay value over time.

use shelf_model::TrendFit;
use tracing::trace;

use crate::error::{Result, StatsError};

/// Straight-line trend model `value = intercept + slope * time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendModel;

impl TrendModel {
    /// Fits the trend to `(time, value)` pairs.
    ///
    /// Pairs are sorted before any arithmetic so the result is independent of
    /// the order they were supplied in. Sums are taken about the means, which
    /// keeps the normal equations well conditioned for late timepoints.
    ///
    /// # Errors
    ///
    /// - [`StatsError::InsufficientData`] with fewer than two observations.
    /// - [`StatsError::DegenerateFit`] when every observation shares one
    ///   timepoint, or the fit is not finite.
    /// - [`StatsError::NumericInstability`] for non-finite inputs.
    pub fn fit(points: &[(f64, f64)]) -> Result<TrendFit> {
        if points.len() < 2 {
            return Err(StatsError::insufficient(format!(
                "a trend needs at least 2 observations, got {}",
                points.len()
            )));
        }
        if points
            .iter()
            .any(|(time, value)| !time.is_finite() || !value.is_finite())
        {
            return Err(StatsError::unstable("trend input contains non-finite values"));
        }

        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let first_time = sorted[0].0;
        let last_time = sorted[sorted.len() - 1].0;
        if first_time == last_time {
            return Err(StatsError::degenerate(format!(
                "all {} observations share timepoint {first_time}; slope is undefined",
                sorted.len()
            )));
        }

        let n = sorted.len();
        let count = n as f64;
        let mean_time = sorted.iter().map(|(t, _)| t).sum::<f64>() / count;
        let mean_value = sorted.iter().map(|(_, v)| v).sum::<f64>() / count;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        let mut syy = 0.0;
        for (time, value) in &sorted {
            let dt = time - mean_time;
            let dv = value - mean_value;
            sxx += dt * dt;
            sxy += dt * dv;
            syy += dv * dv;
        }
        if sxx <= 0.0 {
            return Err(StatsError::degenerate(
                "timepoints have zero variance; slope is undefined",
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_value - slope * mean_time;
        let rss: f64 = sorted
            .iter()
            .map(|(time, value)| {
                let residual = value - (intercept + slope * time);
                residual * residual
            })
            .sum();
        if !slope.is_finite() || !intercept.is_finite() || !rss.is_finite() {
            return Err(StatsError::degenerate(format!(
                "least-squares line is not finite (slope {slope}, intercept {intercept})"
            )));
        }

        let degrees_of_freedom = n - 2;
        let r_squared = if syy > 0.0 {
            (1.0 - rss / syy).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let slope_std_error = if degrees_of_freedom > 0 {
            Some((rss / degrees_of_freedom as f64 / sxx).sqrt())
        } else {
            None
        };

        trace!(n, slope, intercept, rss, "fitted trend");

        Ok(TrendFit {
            slope,
            intercept,
            residual_sum_of_squares: rss,
            degrees_of_freedom,
            n,
            mean_time,
            sxx,
            r_squared,
            slope_std_error,
            time_min: first_time,
            time_max: last_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_known_line() {
        let points = [(0.0, 100.0), (6.0, 97.0), (12.0, 94.0), (18.0, 91.0)];
        let fit = TrendModel::fit(&points).unwrap();
        assert!((fit.slope + 0.5).abs() < 1e-12);
        assert!((fit.intercept - 100.0).abs() < 1e-12);
        assert!(fit.residual_sum_of_squares < 1e-20);
        assert_eq!(fit.degrees_of_freedom, 2);
        assert_eq!(fit.time_min, 0.0);
        assert_eq!(fit.time_max, 18.0);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let error = TrendModel::fit(&[(0.0, 1.0)]).unwrap_err();
        assert!(matches!(error, StatsError::InsufficientData { .. }));
    }

    #[test]
    fn test_identical_timepoints_are_degenerate() {
        let error = TrendModel::fit(&[(3.0, 1.0), (3.0, 1.2), (3.0, 0.9)]).unwrap_err();
        assert!(matches!(error, StatsError::DegenerateFit { .. }));
    }

    #[test]
    fn test_non_finite_input_is_rejected() {
        let error = TrendModel::fit(&[(0.0, 1.0), (1.0, f64::NAN)]).unwrap_err();
        assert!(matches!(error, StatsError::NumericInstability { .. }));
    }

    #[test]
    fn test_order_does_not_change_fit() {
        let forward = [(0.0, 99.5), (3.0, 99.31), (6.0, 99.02), (9.0, 98.88)];
        let mut reversed = forward;
        reversed.reverse();
        assert_eq!(
            TrendModel::fit(&forward).unwrap(),
            TrendModel::fit(&reversed).unwrap()
        );
    }

    #[test]
    fn test_slope_standard_error_needs_residual_df() {
        let fit = TrendModel::fit(&[(0.0, 1.0), (1.0, 2.0)]).unwrap();
        assert_eq!(fit.degrees_of_freedom, 0);
        assert!(fit.slope_std_error.is_none());
        assert!(fit.residual_variance().is_none());
    }
}
