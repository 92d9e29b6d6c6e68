//! Outputs of a stability analysis run.
//!
//! - JSON report carrying every result object
//! - CSV of fitted curves and bounds for chart overlay
//! - Display formatting for rounded p-values and shelf-life estimates

mod bands;
mod format;
mod json;

pub use bands::{BAND_COLUMNS, write_band_csv};
pub use format::{
    NOT_AVAILABLE, NOT_REACHED, SummaryRow, format_p_value, format_poolability, format_shelf_life,
    format_slope,
};
pub use json::{AnalysisReport, GENERATOR, write_json_report};
