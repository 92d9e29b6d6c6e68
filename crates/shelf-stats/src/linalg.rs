//! Dense weighted least squares via Householder QR.
//!
//! Designs here are small (a handful of columns per lot), so a plain
//! row-major matrix and an unpivoted QR are enough. Rank deficiency is
//! detected from the diagonal of `R` relative to the original column norms.

use crate::error::{Result, StatsError};

/// Columns whose `R` diagonal falls below this fraction of their original
/// norm are treated as linearly dependent.
const RANK_TOLERANCE: f64 = 1e-10;

/// Row-major design matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DesignMatrix {
    /// Empty matrix with a fixed column count.
    pub fn with_columns(cols: usize) -> Self {
        Self {
            rows: 0,
            cols,
            data: Vec::new(),
        }
    }

    /// Appends one observation row.
    ///
    /// # Panics
    ///
    /// Panics if the row length differs from the column count.
    pub fn push_row(&mut self, row: &[f64]) {
        assert_eq!(row.len(), self.cols, "design row has wrong width");
        self.data.extend_from_slice(row);
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
}

/// Solution of a (weighted) least-squares problem.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquares {
    pub coefficients: Vec<f64>,
    /// Weighted residual sum of squares.
    pub residual_sum_of_squares: f64,
    /// Observations minus parameters.
    pub degrees_of_freedom: usize,
}

impl LeastSquares {
    pub fn residual_variance(&self) -> Option<f64> {
        if self.degrees_of_freedom == 0 {
            None
        } else {
            Some(self.residual_sum_of_squares / self.degrees_of_freedom as f64)
        }
    }
}

/// Minimises `sum w_i (y_i - x_i b)^2` over `b`.
///
/// `weights = None` is ordinary least squares. Weights must be positive and
/// finite.
pub fn least_squares(
    design: &DesignMatrix,
    response: &[f64],
    weights: Option<&[f64]>,
) -> Result<LeastSquares> {
    let n = design.rows();
    let p = design.cols();
    if response.len() != n {
        return Err(StatsError::degenerate(format!(
            "design has {n} rows but response has {} values",
            response.len()
        )));
    }
    if let Some(weights) = weights
        && weights.len() != n
    {
        return Err(StatsError::degenerate(format!(
            "design has {n} rows but {} weights were supplied",
            weights.len()
        )));
    }
    if p == 0 {
        return Err(StatsError::degenerate("design has no columns"));
    }
    if n < p {
        return Err(StatsError::insufficient(format!(
            "{n} observations cannot identify {p} parameters"
        )));
    }

    // Column-major working copy scaled by sqrt(w).
    let mut a = vec![0.0; n * p];
    let mut b = vec![0.0; n];
    for i in 0..n {
        let w = weight_at(weights, i)?;
        let scale = w.sqrt();
        let row = design.row(i);
        for (j, value) in row.iter().enumerate() {
            if !value.is_finite() {
                return Err(StatsError::unstable(format!(
                    "design entry ({i}, {j}) is not finite"
                )));
            }
            a[j * n + i] = value * scale;
        }
        if !response[i].is_finite() {
            return Err(StatsError::unstable(format!(
                "response value {i} is not finite"
            )));
        }
        b[i] = response[i] * scale;
    }

    let column_norms: Vec<f64> = (0..p).map(|j| norm(&a[j * n..(j + 1) * n])).collect();
    let mut diagonal = vec![0.0; p];

    for k in 0..p {
        let column = &a[k * n + k..(k + 1) * n];
        let alpha_norm = norm(column);
        if column_norms[k] == 0.0 || alpha_norm <= RANK_TOLERANCE * column_norms[k] {
            return Err(StatsError::degenerate(format!(
                "design matrix is singular: column {k} is linearly dependent on earlier columns"
            )));
        }
        let alpha = if column[0] > 0.0 {
            -alpha_norm
        } else {
            alpha_norm
        };
        let mut v: Vec<f64> = column.to_vec();
        v[0] -= alpha;
        let v_norm_sq: f64 = v.iter().map(|x| x * x).sum();
        diagonal[k] = alpha;
        if v_norm_sq == 0.0 {
            continue;
        }
        for j in k..p {
            let col = &mut a[j * n + k..(j + 1) * n];
            let dot: f64 = v.iter().zip(col.iter()).map(|(x, y)| x * y).sum();
            let factor = 2.0 * dot / v_norm_sq;
            for (target, vi) in col.iter_mut().zip(v.iter()) {
                *target -= factor * vi;
            }
        }
        let tail = &mut b[k..];
        let dot: f64 = v.iter().zip(tail.iter()).map(|(x, y)| x * y).sum();
        let factor = 2.0 * dot / v_norm_sq;
        for (target, vi) in tail.iter_mut().zip(v.iter()) {
            *target -= factor * vi;
        }
    }

    // Back substitution on R b = Q^T y.
    let mut coefficients = vec![0.0; p];
    for k in (0..p).rev() {
        let mut sum = b[k];
        for j in k + 1..p {
            sum -= a[j * n + k] * coefficients[j];
        }
        coefficients[k] = sum / diagonal[k];
    }
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(StatsError::degenerate("least-squares coefficients are not finite"));
    }

    let mut rss = 0.0;
    for i in 0..n {
        let fitted: f64 = design
            .row(i)
            .iter()
            .zip(coefficients.iter())
            .map(|(x, c)| x * c)
            .sum();
        let residual = response[i] - fitted;
        rss += weight_at(weights, i)? * residual * residual;
    }
    if !rss.is_finite() {
        return Err(StatsError::unstable("residual sum of squares is not finite"));
    }

    Ok(LeastSquares {
        coefficients,
        residual_sum_of_squares: rss,
        degrees_of_freedom: n - p,
    })
}

fn weight_at(weights: Option<&[f64]>, i: usize) -> Result<f64> {
    match weights {
        None => Ok(1.0),
        Some(weights) => {
            let w = weights[i];
            if w.is_finite() && w > 0.0 {
                Ok(w)
            } else {
                Err(StatsError::degenerate(format!(
                    "weight {i} is {w}; weights must be positive and finite"
                )))
            }
        }
    }
}

fn norm(values: &[f64]) -> f64 {
    // Scaled to avoid overflow on large designs.
    let scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|v| (v / scale) * (v / scale)).sum();
    scale * sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() <= 1e-10
    }

    fn line_design(times: &[f64]) -> DesignMatrix {
        let mut design = DesignMatrix::with_columns(2);
        for &t in times {
            design.push_row(&[1.0, t]);
        }
        design
    }

    #[test]
    fn test_recovers_exact_line() {
        let times = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = times.iter().map(|t| 2.0 + 0.5 * t).collect();
        let fit = least_squares(&line_design(&times), &y, None).unwrap();
        assert!(close(fit.coefficients[0], 2.0));
        assert!(close(fit.coefficients[1], 0.5));
        assert!(fit.residual_sum_of_squares < 1e-20);
        assert_eq!(fit.degrees_of_freedom, 2);
    }

    #[test]
    fn test_matches_closed_form_simple_regression() {
        let times = [0.0, 3.0, 6.0, 9.0, 12.0];
        let y = [99.5, 99.31, 99.02, 98.88, 98.61];
        let fit = least_squares(&line_design(&times), &y, None).unwrap();
        let n = times.len() as f64;
        let tbar = times.iter().sum::<f64>() / n;
        let ybar = y.iter().sum::<f64>() / n;
        let sxy: f64 = times.iter().zip(y.iter()).map(|(t, v)| (t - tbar) * (v - ybar)).sum();
        let sxx: f64 = times.iter().map(|t| (t - tbar) * (t - tbar)).sum();
        let slope = sxy / sxx;
        assert!(close(fit.coefficients[1], slope));
        assert!(close(fit.coefficients[0], ybar - slope * tbar));
    }

    #[test]
    fn test_weights_scale_residuals() {
        let times = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 0.0];
        let unweighted = least_squares(&line_design(&times), &y, None).unwrap();
        let doubled = least_squares(&line_design(&times), &y, Some(&[2.0, 2.0, 2.0])).unwrap();
        assert!(close(
            doubled.residual_sum_of_squares,
            2.0 * unweighted.residual_sum_of_squares
        ));
        assert!(close(doubled.coefficients[0], unweighted.coefficients[0]));
    }

    #[test]
    fn test_detects_collinear_columns() {
        let mut design = DesignMatrix::with_columns(3);
        for t in [0.0, 1.0, 2.0, 3.0] {
            design.push_row(&[1.0, t, 2.0 * t]);
        }
        let error = least_squares(&design, &[1.0, 2.0, 3.0, 4.0], None).unwrap_err();
        assert!(matches!(error, StatsError::DegenerateFit { .. }));
    }

    #[test]
    fn test_rejects_underdetermined_system() {
        let design = line_design(&[1.0]);
        let error = least_squares(&design, &[1.0], None).unwrap_err();
        assert!(matches!(error, StatsError::InsufficientData { .. }));
    }

    #[test]
    fn test_rejects_non_positive_weights() {
        let error =
            least_squares(&line_design(&[0.0, 1.0]), &[0.0, 1.0], Some(&[1.0, 0.0])).unwrap_err();
        assert!(matches!(error, StatsError::DegenerateFit { .. }));
    }
}
