//! Trade domain — executed trade records and the bounded trade window.

mod convert;
pub mod state;
pub mod wire;

use crate::shared::{MarketId, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use state::{IngestOutcome, TradeWindow};

/// One executed trade. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub market: MarketId,
    pub trade_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub executed_at: DateTime<Utc>,
}
