use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Which side of the limit is out of specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitDirection {
    /// Value must stay below the limit (e.g. impurity growth).
    Upper,
    /// Value must stay above the limit (e.g. purity decay).
    Lower,
}

impl LimitDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitDirection::Upper => "upper",
            LimitDirection::Lower => "lower",
        }
    }
}

impl fmt::Display for LimitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upper" | "usl" => Ok(LimitDirection::Upper),
            "lower" | "lsl" => Ok(LimitDirection::Lower),
            other => Err(format!("unknown limit direction '{other}'")),
        }
    }
}

/// Specification boundary for one assay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecLimit {
    pub value: f64,
    pub direction: LimitDirection,
}

impl SpecLimit {
    pub fn upper(value: f64) -> Self {
        Self {
            value,
            direction: LimitDirection::Upper,
        }
    }

    pub fn lower(value: f64) -> Self {
        Self {
            value,
            direction: LimitDirection::Lower,
        }
    }

    /// Rejects non-finite limit values.
    pub fn validate(&self, assay: &str) -> Result<()> {
        if self.value.is_finite() {
            Ok(())
        } else {
            Err(ModelError::InvalidSpecLimit {
                assay: assay.to_string(),
                reason: format!("limit value {} is not finite", self.value),
            })
        }
    }

    /// True when `value` lies strictly on the failing side of the limit.
    pub fn is_violated_by(&self, value: f64) -> bool {
        match self.direction {
            LimitDirection::Upper => value > self.value,
            LimitDirection::Lower => value < self.value,
        }
    }

    /// Signed distance to failure: positive while in specification, zero at
    /// the limit, negative once violated.
    pub fn margin(&self, value: f64) -> f64 {
        match self.direction {
            LimitDirection::Upper => self.value - value,
            LimitDirection::Lower => value - self.value,
        }
    }
}

impl fmt::Display for SpecLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            LimitDirection::Upper => write!(f, "<= {}", self.value),
            LimitDirection::Lower => write!(f, ">= {}", self.value),
        }
    }
}
