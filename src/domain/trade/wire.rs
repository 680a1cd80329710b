//! Wire types for upstream trade feed messages.
//!
//! Every trade field is optional on the wire: feeds occasionally send partial
//! records, and those are rejected at conversion rather than at parse time so
//! one bad record never poisons the rest of a message stream.

use crate::shared::{MarketId, Side};
use serde::{Deserialize, Serialize};

/// Raw trade as delivered by a feed.
///
/// Decimals arrive as strings, `executed_at` as epoch milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTrade {
    #[serde(default)]
    pub market: Option<MarketId>,
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub executed_at: Option<i64>,
}

/// Inbound feed message, tagged by `type`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum FeedMessage {
    #[serde(rename = "trade")]
    Trade { data: RawTrade },
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "disconnected")]
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}
