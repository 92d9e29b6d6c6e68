//! Data model for stability trending and shelf-life estimation.
//!
//! All types are plain values: records are immutable once loaded, results are
//! produced fresh per analysis run and owned by the caller.

pub mod error;
pub mod options;
pub mod record;
pub mod result;
pub mod spec_limit;

pub use error::{ModelError, Result};
pub use options::{AnalysisOptions, BoundKind};
pub use record::{LotGroup, StabilityRecord, group_records};
pub use result::{
    BandPoint, FailureKind, Grouping, PoolabilityResult, ProjectionResult, TrendFit,
    TrendProjection,
};
pub use spec_limit::{LimitDirection, SpecLimit};
