//! Trade tape configuration.
//!
//! The host stores settings as camelCase JSON (`{"numberOfTrades": 100}`).
//! Values are validated on the way in; an invalid value is rejected and the
//! previous configuration stays in effect.

use crate::error::TapeError;
use serde::{Deserialize, Serialize};

/// Retention limit used when the host has not configured one.
pub const DEFAULT_NUMBER_OF_TRADES: usize = 100;

/// Configuration for trade tapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawTapeConfig")]
pub struct TapeConfig {
    /// How many recent trades each tape retains.
    pub number_of_trades: usize,
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self {
            number_of_trades: DEFAULT_NUMBER_OF_TRADES,
        }
    }
}

impl TapeConfig {
    pub fn new(number_of_trades: usize) -> Result<Self, TapeError> {
        let config = Self { number_of_trades };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate host JSON.
    pub fn from_json(json: &str) -> Result<Self, TapeError> {
        let raw: RawTapeConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn validate(&self) -> Result<(), TapeError> {
        validate_capacity(self.number_of_trades).map(|_| ())
    }
}

/// Reject a zero retention limit.
pub fn validate_capacity(capacity: usize) -> Result<usize, TapeError> {
    if capacity == 0 {
        return Err(TapeError::InvalidConfiguration(
            "numberOfTrades must be at least 1".to_string(),
        ));
    }
    Ok(capacity)
}

/// Host-side shape: signed, so negative values surface as configuration
/// errors instead of parse errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTapeConfig {
    #[serde(default)]
    number_of_trades: Option<i64>,
}

impl TryFrom<RawTapeConfig> for TapeConfig {
    type Error = TapeError;

    fn try_from(raw: RawTapeConfig) -> Result<Self, Self::Error> {
        let Some(n) = raw.number_of_trades else {
            return Ok(Self::default());
        };
        if n <= 0 {
            return Err(TapeError::InvalidConfiguration(format!(
                "numberOfTrades must be at least 1, got {}",
                n
            )));
        }
        let n = usize::try_from(n)
            .map_err(|_| TapeError::InvalidConfiguration(format!("numberOfTrades {} too large", n)))?;
        Self::new(n)
    }
}
