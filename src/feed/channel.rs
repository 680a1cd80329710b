//! In-memory feed — hosts (and tests) push events or raw JSON into it.

use super::{FeedEvent, FeedStream, TradeFeed};
use crate::domain::trade::wire::{FeedMessage, RawTrade};
use crate::error::TapeError;
use crate::shared::MarketId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct ChannelState {
    senders: HashMap<MarketId, mpsc::UnboundedSender<FeedEvent>>,
    subscribes: HashMap<MarketId, usize>,
    unsubscribes: HashMap<MarketId, usize>,
}

/// Channel-backed `TradeFeed`.
#[derive(Debug, Default)]
pub struct ChannelFeed {
    state: Mutex<ChannelState>,
    unsupported: HashSet<MarketId>,
    failing: HashSet<MarketId>,
}

impl ChannelFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `market` as lacking live trades.
    pub fn without_live_trades(mut self, market: impl Into<MarketId>) -> Self {
        self.unsupported.insert(market.into());
        self
    }

    /// Make every `subscribe` for `market` fail.
    pub fn failing(mut self, market: impl Into<MarketId>) -> Self {
        self.failing.insert(market.into());
        self
    }

    /// Push an event to the open subscription for `market`.
    ///
    /// Returns `false` when nobody is subscribed.
    pub fn publish(&self, market: &MarketId, event: FeedEvent) -> bool {
        let state = self.state.lock();
        match state.senders.get(market) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn publish_trade(&self, market: &MarketId, trade: RawTrade) -> bool {
        self.publish(market, FeedEvent::Trade(trade))
    }

    /// Parse a raw JSON feed message and push it.
    pub fn publish_text(&self, market: &MarketId, text: &str) -> Result<bool, TapeError> {
        let msg: FeedMessage = serde_json::from_str(text)?;
        Ok(self.publish(market, msg.into()))
    }

    pub fn is_subscribed(&self, market: &MarketId) -> bool {
        self.state.lock().senders.contains_key(market)
    }

    /// How many times `market` was subscribed upstream.
    pub fn subscribe_count(&self, market: &MarketId) -> usize {
        self.state.lock().subscribes.get(market).copied().unwrap_or(0)
    }

    /// How many times `market` was unsubscribed upstream.
    pub fn unsubscribe_count(&self, market: &MarketId) -> usize {
        self.state.lock().unsubscribes.get(market).copied().unwrap_or(0)
    }
}

impl TradeFeed for ChannelFeed {
    fn supports_live_trades(&self, market: &MarketId) -> bool {
        !self.unsupported.contains(market)
    }

    fn subscribe(&self, market: &MarketId) -> Result<FeedStream, TapeError> {
        if self.failing.contains(market) {
            return Err(TapeError::Feed(format!("subscribe to {} refused", market)));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.senders.insert(market.clone(), tx).is_some() {
            tracing::warn!("Replacing live channel subscription for {}", market);
        }
        *state.subscribes.entry(market.clone()).or_insert(0) += 1;

        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        }))
    }

    fn unsubscribe(&self, market: &MarketId) {
        let mut state = self.state.lock();
        state.senders.remove(market);
        *state.unsubscribes.entry(market.clone()).or_insert(0) += 1;
    }
}
