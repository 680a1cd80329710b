//! Tape registry — one shared tape per market, reference counted.
//!
//! The registry tracks how many holders each market's tape has. The first
//! `acquire` for a market creates the tape and opens the upstream feed
//! subscription (holders 0→1); the last `release` destroys the tape and
//! closes that subscription (holders 1→0). Feed subscribe/unsubscribe both
//! happen under the registry lock, so a market never has two live upstream
//! subscriptions even when views switch markets concurrently.

use super::{StreamStatus, TradeTape};
use crate::config::{self, TapeConfig};
use crate::domain::market::Market;
use crate::error::TapeError;
use crate::feed::TradeFeed;
use crate::shared::MarketId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Entry {
    tape: TradeTape,
    holders: usize,
}

/// Owner of every live trade tape. Pass it to views by reference.
pub struct TapeRegistry {
    feed: Arc<dyn TradeFeed>,
    capacity: AtomicUsize,
    entries: Mutex<HashMap<MarketId, Entry>>,
}

impl TapeRegistry {
    pub fn builder() -> TapeRegistryBuilder {
        TapeRegistryBuilder::default()
    }

    /// Get the tape for `market`, creating it on first acquisition.
    ///
    /// Markets without live trades (per the market's capability flag or the
    /// feed's) get a permanently empty tape flagged unsupported. A feed that
    /// refuses the subscription yields a degraded tape. Never fails.
    pub fn acquire(&self, market: &Market) -> TradeTape {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(&market.id) {
            entry.holders += 1;
            tracing::debug!("Tape {} acquired ({} holders)", market.id, entry.holders);
            return entry.tape.clone();
        }

        let live = market.supports_live_trades() && self.feed.supports_live_trades(&market.id);
        let tape = if live {
            // Capacity is validated on every write.
            let capacity = self.capacity.load(Ordering::SeqCst);
            let tape = TradeTape::build(market.id.clone(), capacity, true, StreamStatus::Live);
            if let Err(e) = tape.connect(Arc::clone(&self.feed)) {
                tracing::warn!("Trade feed unavailable for {}: {}", market.id, e);
                tape.set_status(StreamStatus::Degraded);
            }
            tape
        } else {
            tracing::info!("Market {} has no live trades", market.id);
            TradeTape::unsupported(market.id.clone())
        };

        tracing::info!("Tape {} created", market.id);
        entries.insert(
            market.id.clone(),
            Entry {
                tape: tape.clone(),
                holders: 1,
            },
        );
        tape
    }

    /// Drop one hold on `market`'s tape; the last release destroys it.
    ///
    /// Returns `false` (and does nothing) if the market is not held.
    pub fn release(&self, market: &MarketId) -> bool {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(market) else {
            tracing::debug!("Release of unheld tape {} ignored", market);
            return false;
        };

        entry.holders = entry.holders.saturating_sub(1);
        if entry.holders > 0 {
            tracing::debug!("Tape {} released ({} holders)", market, entry.holders);
            return true;
        }

        if let Some(entry) = entries.remove(market) {
            entry.tape.destroy();
            tracing::info!("Tape {} released and destroyed", market);
        }
        true
    }

    /// Number of holders for `market` (zero if no tape exists).
    pub fn holders(&self, market: &MarketId) -> usize {
        self.entries
            .lock()
            .get(market)
            .map(|e| e.holders)
            .unwrap_or(0)
    }

    pub fn contains(&self, market: &MarketId) -> bool {
        self.entries.lock().contains_key(market)
    }

    /// Markets with a live tape, sorted.
    pub fn markets(&self) -> Vec<MarketId> {
        let mut markets: Vec<_> = self.entries.lock().keys().cloned().collect();
        markets.sort();
        markets
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Current retention limit applied to new and existing tapes.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::SeqCst)
    }

    /// Change the retention limit for every tape.
    ///
    /// Rejects zero; the previous limit then stays in effect everywhere.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), TapeError> {
        let capacity = config::validate_capacity(capacity)?;
        let entries = self.entries.lock();
        self.capacity.store(capacity, Ordering::SeqCst);
        for entry in entries.values() {
            entry.tape.set_capacity(capacity)?;
        }
        tracing::info!("Trade tape capacity set to {}", capacity);
        Ok(())
    }

    /// Apply every configuration change published on `config` until the
    /// sender or the registry goes away.
    pub fn watch_config(
        self: &Arc<Self>,
        mut config: watch::Receiver<TapeConfig>,
    ) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            while config.changed().await.is_ok() {
                let next = *config.borrow_and_update();
                let Some(registry) = registry.upgrade() else {
                    return;
                };
                if let Err(e) = registry.set_capacity(next.number_of_trades) {
                    tracing::warn!("Ignoring configuration change: {}", e);
                }
            }
        })
    }

    /// Destroy every tape regardless of holders.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        for (market, entry) in drained {
            tracing::debug!("Shutting down tape {} ({} holders)", market, entry.holders);
            entry.tape.destroy();
        }
    }
}

impl Drop for TapeRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct TapeRegistryBuilder {
    feed: Option<Arc<dyn TradeFeed>>,
    config: TapeConfig,
}

impl TapeRegistryBuilder {
    pub fn feed(mut self, feed: Arc<dyn TradeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn config(mut self, config: TapeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn number_of_trades(mut self, n: usize) -> Self {
        self.config.number_of_trades = n;
        self
    }

    pub fn build(self) -> Result<Arc<TapeRegistry>, TapeError> {
        self.config.validate()?;
        let feed = self
            .feed
            .ok_or_else(|| TapeError::InvalidConfiguration("a trade feed is required".into()))?;
        Ok(Arc::new(TapeRegistry {
            feed,
            capacity: AtomicUsize::new(self.config.number_of_trades),
            entries: Mutex::new(HashMap::new()),
        }))
    }
}
