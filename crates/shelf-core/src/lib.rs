//! Stability analysis workflow.
//!
//! For each product and assay the workflow runs the poolability test when
//! two or more lots carry data, decides the grouping from its outcome, and
//! projects the shelf life. Assays are independent: a failure in one is
//! recorded on its outcome and never aborts the others.

mod assay;
mod cache;
mod context;
mod error;
mod study;

pub use assay::{AssayFailure, AssayOutcome, UNEXPECTED_FAILURE_REASON, analyze_assay};
pub use cache::{CacheKey, ResultCache, fingerprint};
pub use context::AnalysisContext;
pub use error::{CoreError, Result};
pub use study::{ProductAnalysis, StudyAnalysis, analyze_study, analyze_study_cached};
