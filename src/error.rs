//! Unified error types.

use crate::shared::MarketId;
use thiserror::Error;

/// Top-level trade tape error.
#[derive(Error, Debug)]
pub enum TapeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed trade: {0}")]
    MalformedTrade(String),

    #[error("Unknown market: {0}")]
    UnknownMarket(MarketId),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl TapeError {
    pub(crate) fn missing_field(field: &str) -> Self {
        TapeError::MalformedTrade(format!("missing field `{}`", field))
    }
}
