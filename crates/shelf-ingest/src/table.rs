//! Loading the relational stability table.
//!
//! The table has one row per observation with `product_id`, `lot_id`, a
//! numeric time column and one numeric column per assay. Assay cells may be
//! empty; such cells are dropped from that assay only.

use std::path::Path;

use polars::prelude::*;
use shelf_model::StabilityRecord;
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::value::{any_to_f64, any_to_string, measurement};

pub const PRODUCT_COLUMN: &str = "product_id";
pub const LOT_COLUMN: &str = "lot_id";
pub const DEFAULT_TIME_COLUMN: &str = "timepoint_months";

/// Reads a stability CSV file into a DataFrame.
pub fn read_stability_table(path: &Path) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if df.height() == 0 {
        return Err(IngestError::EmptyTable {
            path: path.to_path_buf(),
        });
    }

    info!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded stability table"
    );
    Ok(df)
}

/// Columns that can be trended, in table order.
///
/// Numeric columns qualify directly. Text columns qualify when every cell is
/// a number or a missing-value marker such as `NA`.
pub fn assay_columns(df: &DataFrame, time_column: &str) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|column| {
            let name = column.name().as_str();
            name != PRODUCT_COLUMN && name != LOT_COLUMN && name != time_column
        })
        .filter(|column| is_measurement_column(column))
        .map(|column| column.name().to_string())
        .collect()
}

fn is_measurement_column(column: &Column) -> bool {
    match column.dtype() {
        dtype if dtype.is_primitive_numeric() => true,
        DataType::String => {
            let mut seen_number = false;
            for row in 0..column.len() {
                match column.get(row).map(measurement) {
                    Ok(Ok(Some(_))) => seen_number = true,
                    Ok(Ok(None)) => {}
                    _ => return false,
                }
            }
            seen_number
        }
        _ => false,
    }
}

/// Converts table rows into records.
///
/// `assays` selects the assay columns to carry; `None` takes every numeric
/// column besides the identifiers and the time column.
///
/// # Errors
///
/// A required or requested column is missing, an identifier or time cell is
/// empty or non-numeric, or an assay cell holds text that is not a number or
/// a missing-value marker.
pub fn records_from_frame(
    df: &DataFrame,
    time_column: &str,
    assays: Option<&[String]>,
) -> Result<Vec<StabilityRecord>> {
    let product_col = required_column(df, PRODUCT_COLUMN)?;
    let lot_col = required_column(df, LOT_COLUMN)?;
    let time_col = required_column(df, time_column)?;

    let assay_names: Vec<String> = match assays {
        Some(names) => names.to_vec(),
        None => assay_columns(df, time_column),
    };
    let assay_cols = assay_names
        .iter()
        .map(|name| required_column(df, name).map(|col| (name.as_str(), col)))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(df.height());
    let mut missing = 0usize;
    for row in 0..df.height() {
        let product_id = any_to_string(product_col.get(row)?);
        let lot_id = any_to_string(lot_col.get(row)?);
        if product_id.is_empty() {
            return Err(invalid(PRODUCT_COLUMN, row, product_id));
        }
        if lot_id.is_empty() {
            return Err(invalid(LOT_COLUMN, row, lot_id));
        }
        let time_cell = time_col.get(row)?;
        let timepoint = match any_to_f64(time_cell.clone()) {
            Some(t) if t.is_finite() => t,
            _ => return Err(invalid(time_column, row, any_to_string(time_cell))),
        };

        let mut record = StabilityRecord::new(product_id, lot_id, timepoint);
        for (name, col) in &assay_cols {
            match measurement(col.get(row)?) {
                Ok(Some(value)) => record = record.with_assay(*name, value),
                Ok(None) => missing += 1,
                Err(text) => return Err(invalid(name, row, text)),
            }
        }
        records.push(record);
    }

    debug!(
        records = records.len(),
        assays = assay_names.len(),
        missing,
        "Converted stability rows"
    );
    Ok(records)
}

/// Reads a stability CSV and converts it to records in one step.
pub fn load_stability_records(
    path: &Path,
    time_column: &str,
    assays: Option<&[String]>,
) -> Result<Vec<StabilityRecord>> {
    let df = read_stability_table(path)?;
    records_from_frame(&df, time_column, assays)
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| IngestError::MissingColumn {
        column: name.to_string(),
    })
}

fn invalid(column: &str, row: usize, value: String) -> IngestError {
    // Report 1-based data rows.
    IngestError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        value,
    }
}
