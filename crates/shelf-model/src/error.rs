use thiserror::Error;

/// Errors raised while assembling model values from loaded records.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("lot group is empty")]
    EmptyLotGroup,
    #[error("lot {lot_id} mixes products {expected} and {found}")]
    MixedProducts {
        lot_id: String,
        expected: String,
        found: String,
    },
    #[error("lot group {expected} received a record for lot {found}")]
    MixedLots { expected: String, found: String },
    #[error("invalid analysis option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("invalid spec limit for {assay}: {reason}")]
    InvalidSpecLimit { assay: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
