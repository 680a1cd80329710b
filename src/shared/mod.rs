//! Shared newtypes and utilities used across all modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw format the host and feeds use, so they can be used directly in wire
//! types without conversion overhead.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Base URI under which the host opens trade history panes.
pub const BASE_URI: &str = "via://trade-history";

// ─── MarketId ────────────────────────────────────────────────────────────────

/// Opaque, stable market identifier (e.g. `"COINBASE:BTC-USD"`).
///
/// Registries key exclusively on this value, never on a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(String);

impl MarketId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the market identifier from a pane URI.
    ///
    /// `via://trade-history/<id>` yields `Some(id)`. The bare base URI (a pane
    /// with no market selected yet), an empty identifier, or a foreign URI
    /// yield `None`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(BASE_URI)?;
        let id = rest.strip_prefix('/')?;
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_string()))
        }
    }

    /// Build the pane URI that displays this market.
    pub fn to_uri(&self) -> String {
        format!("{}/{}", BASE_URI, self.0)
    }
}

impl std::fmt::Display for MarketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MarketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for MarketId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MarketId(s.to_string()))
    }
}

impl Serialize for MarketId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MarketId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(MarketId(s))
    }
}

// ─── Side ────────────────────────────────────────────────────────────────────

/// Taker (aggressor) side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "bid")]
    Buy,
    #[serde(alias = "ask")]
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}
