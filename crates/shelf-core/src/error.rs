//! Errors that stop a whole study analysis.
//!
//! Per-assay statistical failures never surface here; they are recorded on
//! the assay outcome instead.

use shelf_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no stability records to analyse")]
    NoRecords,

    #[error("product {product} has no stability records")]
    UnknownProduct { product: String },

    #[error("lots not found for product {product}: {}", lots.join(", "))]
    UnknownLots { product: String, lots: Vec<String> },

    #[error("assay {assay} has no spec limit configured")]
    MissingSpecLimit { assay: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
