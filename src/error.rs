use thiserror::Error;

use crate::core::types::FreqQuantity;

pub type Result<T> = std::result::Result<T, CtFreqError>;

#[derive(Error, Debug)]
pub enum CtFreqError {
    #[error("Unknown freq. filter type: {0}")]
    UnknownFilterType(String),

    #[error("Unknown freq. quantity: {0}")]
    UnknownQuantity(String),

    #[error("Unknown sort key: {0}")]
    UnknownSortKey(String),

    #[error("Unknown alpha level: {0}")]
    UnknownAlphaLevel(String),

    #[error("Unknown color mapping: {0}")]
    UnknownColorMapping(String),

    #[error("Unknown save mode: {0}")]
    UnknownSaveMode(String),

    #[error("Unknown save format: {0}")]
    UnknownSaveFormat(String),

    #[error("Quantity {0} is not available for the current attributes")]
    QuantityUnavailable(FreqQuantity),

    #[error("Data fetch failed: {0}")]
    Fetch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
