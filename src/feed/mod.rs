//! Upstream trade feeds.
//!
//! A feed delivers a push stream of trade events for one market. Delivery is
//! mostly chronological but not strictly monotonic; tapes absorb the jitter.
//! The registry opens at most one feed subscription per market and closes it
//! exactly once when the last holder releases the tape.

pub mod channel;

use crate::domain::trade::wire::{FeedMessage, RawTrade};
use crate::error::TapeError;
use crate::shared::MarketId;
use futures_util::stream::Stream;
use std::pin::Pin;

pub use channel::ChannelFeed;

/// Stream of events for one market subscription.
pub type FeedStream = Pin<Box<dyn Stream<Item = FeedEvent> + Send>>;

/// Events delivered by a feed subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// An executed trade, not yet validated.
    Trade(RawTrade),
    /// The upstream stream is (again) delivering.
    Connected,
    /// The upstream connection dropped.
    Disconnected { reason: String },
    /// The upstream reported an error.
    Error(String),
}

impl From<FeedMessage> for FeedEvent {
    fn from(msg: FeedMessage) -> Self {
        match msg {
            FeedMessage::Trade { data } => FeedEvent::Trade(data),
            FeedMessage::Connected => FeedEvent::Connected,
            FeedMessage::Disconnected { reason } => FeedEvent::Disconnected { reason },
            FeedMessage::Error { message, code } => match code {
                Some(code) => FeedEvent::Error(format!("{}: {}", code, message)),
                None => FeedEvent::Error(message),
            },
        }
    }
}

/// Upstream trade feed adapter.
///
/// Implementations must not call back into the registry from `subscribe` or
/// `unsubscribe`: both run while the registry holds its lock.
pub trait TradeFeed: Send + Sync {
    /// Whether this feed can stream live trades for `market` at all.
    fn supports_live_trades(&self, _market: &MarketId) -> bool {
        true
    }

    /// Open the trade stream for `market`.
    fn subscribe(&self, market: &MarketId) -> Result<FeedStream, TapeError>;

    /// Close the trade stream for `market`.
    fn unsubscribe(&self, market: &MarketId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_event_from_message() {
        let ev: FeedEvent = FeedMessage::Error {
            message: "slow down".into(),
            code: Some("429".into()),
        }
        .into();
        assert_eq!(ev, FeedEvent::Error("429: slow down".into()));

        let ev: FeedEvent = FeedMessage::Disconnected {
            reason: "eof".into(),
        }
        .into();
        assert_eq!(
            ev,
            FeedEvent::Disconnected {
                reason: "eof".into()
            }
        );
    }
}
