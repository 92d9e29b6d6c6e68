//! Error types for stability data ingestion.

use std::path::PathBuf;

use shelf_model::ModelError;
use thiserror::Error;

/// Errors that can occur while loading data or configuration.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Input file not found.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read a file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === CSV Errors ===
    /// Failed to parse CSV with Polars.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// Failed to write CSV.
    #[error("failed to write CSV {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// CSV file has no data rows.
    #[error("CSV file has no data rows: {path}")]
    EmptyTable { path: PathBuf },

    // === Table Errors ===
    /// Required column not present in the stability table.
    #[error("required column '{column}' not found in stability table")]
    MissingColumn { column: String },

    /// A cell could not be interpreted.
    #[error("invalid {column} value '{value}' in row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },

    // === Configuration Errors ===
    /// Configuration file is not valid TOML for the expected schema.
    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration parsed but holds out-of-range values.
    #[error("invalid configuration {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    /// Records violate a data model invariant.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IngestError::MissingColumn {
            column: "lot_id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "required column 'lot_id' not found in stability table"
        );
    }

    #[test]
    fn test_error_from_polars() {
        let polars_err = polars::prelude::PolarsError::ColumnNotFound("test".into());
        let ingest_err: IngestError = polars_err.into();
        assert!(matches!(ingest_err, IngestError::DataFrame { .. }));
    }
}
