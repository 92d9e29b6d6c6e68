//! Statistical core for stability trending.
//!
//! Provides the least-squares trend fit, the ANCOVA slope-poolability test
//! and the shelf-life projection against a specification limit. All
//! computations are pure functions of their inputs.
//!
//! # Example
//!
//! ```ignore
//! use shelf_model::{AnalysisOptions, Grouping, SpecLimit, group_records};
//! use shelf_stats::{project, test_poolability};
//!
//! let lots = group_records(records)?;
//! let options = AnalysisOptions::default();
//! let poolability = test_poolability(&lots, "purity", &options)?;
//! let grouping = Grouping::decide(lots.len(), Some(&poolability));
//! let projection = project(&lots, "purity", grouping, &SpecLimit::lower(95.0), &options)?;
//! ```

mod distribution;
mod error;
mod linalg;
mod poolability;
mod projection;
mod special;
mod trend;

// === Error Types ===
pub use error::{Result, StatsError};

// === Distributions ===
pub use distribution::{FisherSnedecor, StudentT};
pub use special::{ln_gamma, regularized_incomplete_beta};

// === Least Squares ===
pub use linalg::{DesignMatrix, LeastSquares, least_squares};
pub use trend::TrendModel;

// === Poolability ===
pub use poolability::{MIN_RESIDUAL_DF, NOT_POOLABLE_REASON, POOLABLE_REASON, test_poolability};

// === Projection ===
pub use projection::{POOLED_LABEL, TrendBound, project};
