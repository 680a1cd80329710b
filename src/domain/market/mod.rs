//! Market domain — market identity and data-feature capabilities.

pub mod directory;

use crate::shared::MarketId;
use serde::{Deserialize, Serialize};

pub use directory::{CachingDirectory, MarketDirectory, StaticDirectory};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// Data features a market offers. Checked explicitly at acquire time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub live_trades: bool,
}

impl Capabilities {
    pub fn live_trades() -> Self {
        Self { live_trades: true }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

// ─── Market ──────────────────────────────────────────────────────────────────

/// A resolved market: stable identity, display name, capabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub name: String,
    #[serde(default)]
    pub capabilities: Capabilities,
}

impl Market {
    pub fn new(id: impl Into<MarketId>, name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities,
        }
    }

    pub fn supports_live_trades(&self) -> bool {
        self.capabilities.live_trades
    }

    /// Pane title for this market.
    pub fn title(&self) -> String {
        format!("Trade History: {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_deserialize_defaults_capabilities() {
        let m: Market = serde_json::from_str(r#"{"id":"X:BTC","name":"BTC"}"#).unwrap();
        assert!(!m.supports_live_trades());

        let m: Market = serde_json::from_str(
            r#"{"id":"X:BTC","name":"BTC","capabilities":{"liveTrades":true}}"#,
        )
        .unwrap();
        assert!(m.supports_live_trades());
        assert_eq!(m.title(), "Trade History: BTC");
    }
}
