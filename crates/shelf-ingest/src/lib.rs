//! Stability data ingestion.
//!
//! Loads the relational stability table (CSV via Polars) and the TOML
//! analysis configuration, and generates seeded synthetic studies.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use shelf_ingest::{load_analysis_config, load_stability_records};
//!
//! let config = load_analysis_config(Path::new("config/stability.toml"))?;
//! let records = load_stability_records(
//!     Path::new("stability.csv"),
//!     config.time_column(),
//!     Some(config.assays().as_slice()),
//! )?;
//! ```

mod config;
mod error;
mod mock;
mod table;
mod value;

// === Error Types ===
pub use error::{IngestError, Result};

// === Stability Table ===
pub use table::{
    DEFAULT_TIME_COLUMN, LOT_COLUMN, PRODUCT_COLUMN, assay_columns, load_stability_records,
    read_stability_table, records_from_frame,
};

// === Configuration ===
pub use config::{AnalysisConfig, AnalysisSection, load_analysis_config, parse_analysis_config};

// === Synthetic Data ===
pub use mock::{
    DEFAULT_MOCK_SEED, MOCK_LOTS, MOCK_TIMEPOINTS, generate_mock_study, write_stability_csv,
};

// === Cell Helpers ===
pub use value::{any_to_f64, any_to_string, format_numeric};
