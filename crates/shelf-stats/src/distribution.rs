//! Student-t and F distributions.

use crate::error::{Result, StatsError};
use crate::special::regularized_incomplete_beta;

const QUANTILE_MAX_ITERATIONS: usize = 400;
const QUANTILE_UPPER_CAP: f64 = 1e12;

/// Student's t distribution with `df` degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentT {
    df: f64,
}

impl StudentT {
    pub fn new(df: usize) -> Result<Self> {
        if df == 0 {
            return Err(StatsError::insufficient(
                "t distribution needs at least one degree of freedom",
            ));
        }
        Ok(Self { df: df as f64 })
    }

    pub fn df(&self) -> f64 {
        self.df
    }

    /// Upper tail probability `P(T > t)`.
    pub fn sf(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        let x = self.df / (self.df + t * t);
        let tail = 0.5 * regularized_incomplete_beta(self.df / 2.0, 0.5, x);
        if t >= 0.0 { tail } else { 1.0 - tail }
    }

    pub fn cdf(&self, t: f64) -> f64 {
        1.0 - self.sf(t)
    }

    /// Inverse CDF, found by bisection on the upper tail.
    pub fn quantile(&self, p: f64) -> Result<f64> {
        if !(p > 0.0 && p < 1.0) {
            return Err(StatsError::unstable(format!(
                "t quantile probability {p} is not in (0, 1)"
            )));
        }
        if p == 0.5 {
            return Ok(0.0);
        }
        if p < 0.5 {
            return self.quantile(1.0 - p).map(|value| -value);
        }
        let target = 1.0 - p;
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        while self.sf(hi) > target {
            hi *= 2.0;
            if hi > QUANTILE_UPPER_CAP {
                return Err(StatsError::unstable(format!(
                    "t quantile for p = {p} with df = {} did not bracket",
                    self.df
                )));
            }
        }
        for _ in 0..QUANTILE_MAX_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if self.sf(mid) > target {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo <= 1e-14 * hi.max(1.0) {
                break;
            }
        }
        Ok(0.5 * (lo + hi))
    }
}

/// Fisher-Snedecor F distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisherSnedecor {
    d1: f64,
    d2: f64,
}

impl FisherSnedecor {
    pub fn new(d1: usize, d2: usize) -> Result<Self> {
        if d1 == 0 || d2 == 0 {
            return Err(StatsError::insufficient(format!(
                "F distribution needs positive degrees of freedom, got ({d1}, {d2})"
            )));
        }
        Ok(Self {
            d1: d1 as f64,
            d2: d2 as f64,
        })
    }

    /// Upper tail probability `P(F > f)`, i.e. the p-value of an F test.
    pub fn sf(&self, f: f64) -> f64 {
        if f.is_nan() {
            return f64::NAN;
        }
        if f <= 0.0 {
            return 1.0;
        }
        if f.is_infinite() {
            return 0.0;
        }
        let x = self.d2 / (self.d2 + self.d1 * f);
        regularized_incomplete_beta(self.d2 / 2.0, self.d1 / 2.0, x)
    }

    pub fn cdf(&self, f: f64) -> f64 {
        1.0 - self.sf(f)
    }
}
