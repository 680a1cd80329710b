//! Trade tape — the live, bounded trade buffer for one market.
//!
//! A `TradeTape` wraps a [`TradeWindow`] with:
//! - Ingestion from an upstream feed (validated at the boundary)
//! - Point-in-time snapshots that never observe a partial mutation
//! - Coalesced change notification: any number of mutations within one
//!   scheduling turn produce exactly one `TapeUpdate` per listener
//! - Explicit teardown that closes the upstream subscription exactly once
//!
//! Tapes are cheap handles (`Clone` shares the same tape). They spawn a
//! dispatcher task and therefore must be created inside a tokio runtime.

pub mod listeners;
pub mod registry;
pub mod snapshot;

use crate::config;
use crate::domain::trade::wire::RawTrade;
use crate::domain::trade::{IngestOutcome, TradeRecord, TradeWindow};
use crate::error::TapeError;
use crate::feed::{FeedEvent, FeedStream, TradeFeed};
use crate::shared::MarketId;
use futures_util::StreamExt;
use listeners::ListenerSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub use listeners::{ListenerHandle, ListenerId};
pub use registry::{TapeRegistry, TapeRegistryBuilder};
pub use snapshot::{TapeSnapshot, TradeRow};

// ─── Status & updates ────────────────────────────────────────────────────────

/// Health of a tape's upstream stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    /// Receiving (or ready to receive) live trades.
    Live,
    /// Upstream dropped or errored; contents are stale but valid.
    Degraded,
    /// The market has no live trade feed. The tape stays empty forever.
    Unsupported,
}

/// Coalesced notification delivered to tape listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct TapeUpdate {
    pub market: MarketId,
    pub status: StreamStatus,
    pub len: usize,
    /// Mutation counter at the time of delivery.
    pub revision: u64,
}

// ─── TradeTape ───────────────────────────────────────────────────────────────

struct TapeState {
    window: TradeWindow,
    status: StreamStatus,
    revision: u64,
    dirty: bool,
    /// Open batches; deliveries wait until this drops back to zero.
    batch_depth: usize,
    destroyed: bool,
}

struct FeedLink {
    feed: Arc<dyn TradeFeed>,
    pump: JoinHandle<()>,
}

struct Shared {
    market: MarketId,
    supports_live_trades: bool,
    state: Mutex<TapeState>,
    listeners: ListenerSet,
    wake: Arc<Notify>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    feed: Mutex<Option<FeedLink>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.abort();
        }
        if let Some(link) = self.feed.get_mut().take() {
            link.pump.abort();
        }
    }
}

/// Shared handle to one market's live trade tape.
#[derive(Clone)]
pub struct TradeTape {
    shared: Arc<Shared>,
}

impl TradeTape {
    /// Create a tape for a market with live trades, without a feed attached.
    ///
    /// Fails with `InvalidConfiguration` if `capacity` is zero.
    pub fn new(market: MarketId, capacity: usize) -> Result<Self, TapeError> {
        let capacity = config::validate_capacity(capacity)?;
        Ok(Self::build(market, capacity, true, StreamStatus::Live))
    }

    /// Create a permanently empty tape for a market with no live trade feed.
    pub fn unsupported(market: MarketId) -> Self {
        Self::build(market, 1, false, StreamStatus::Unsupported)
    }

    fn build(
        market: MarketId,
        capacity: usize,
        supports_live_trades: bool,
        status: StreamStatus,
    ) -> Self {
        let wake = Arc::new(Notify::new());
        let shared = Arc::new(Shared {
            market: market.clone(),
            supports_live_trades,
            state: Mutex::new(TapeState {
                window: TradeWindow::new(market, capacity),
                status,
                revision: 0,
                dirty: false,
                batch_depth: 0,
                destroyed: false,
            }),
            listeners: ListenerSet::default(),
            wake: Arc::clone(&wake),
            dispatcher: Mutex::new(None),
            feed: Mutex::new(None),
        });

        if supports_live_trades {
            let handle = tokio::spawn(dispatch_loop(Arc::downgrade(&shared), wake));
            *shared.dispatcher.lock() = Some(handle);
        }

        Self { shared }
    }

    /// Open the upstream subscription and start pumping its events in.
    pub(crate) fn connect(&self, feed: Arc<dyn TradeFeed>) -> Result<(), TapeError> {
        let events = feed.subscribe(&self.shared.market)?;
        let pump = tokio::spawn(pump(Arc::downgrade(&self.shared), events));
        tracing::debug!("Feed attached to tape {}", self.shared.market);
        *self.shared.feed.lock() = Some(FeedLink { feed, pump });
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn market(&self) -> &MarketId {
        &self.shared.market
    }

    /// Capability flag: `false` means "unsupported", never "no data yet".
    pub fn supports_live_trades(&self) -> bool {
        self.shared.supports_live_trades
    }

    pub fn status(&self) -> StreamStatus {
        self.shared.state.lock().status
    }

    pub fn capacity(&self) -> usize {
        self.shared.state.lock().window.capacity()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().window.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.shared.state.lock().revision
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.state.lock().destroyed
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Whether two handles refer to the same tape.
    pub fn ptr_eq(&self, other: &TradeTape) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Insert one record in chronological position.
    ///
    /// Schedules a coalesced notification; never notifies synchronously.
    pub fn ingest(&self, record: TradeRecord) -> IngestOutcome {
        if !self.shared.supports_live_trades {
            return IngestOutcome::Unsupported;
        }
        if record.market != self.shared.market {
            tracing::warn!(
                "Dropping {} trade {} offered to tape {}",
                record.market,
                record.trade_id,
                self.shared.market
            );
            return IngestOutcome::Rejected;
        }

        let outcome = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return IngestOutcome::Closed;
            }
            let outcome = state.window.push(record);
            if outcome.is_inserted() {
                state.revision += 1;
                state.dirty = true;
                if state.status == StreamStatus::Degraded {
                    state.status = StreamStatus::Live;
                }
            }
            outcome
        };

        if outcome.is_inserted() {
            self.shared.wake.notify_one();
        }
        outcome
    }

    /// Validate a raw feed record and ingest it.
    ///
    /// Malformed records are returned as errors for the caller to log; they
    /// never reach the window.
    pub fn ingest_raw(&self, raw: RawTrade) -> Result<IngestOutcome, TapeError> {
        let record = raw.into_record(&self.shared.market)?;
        Ok(self.ingest(record))
    }

    /// Ingest many records (e.g. a backfill). Returns how many were inserted.
    pub fn ingest_batch<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = TradeRecord>,
    {
        self.shared.begin_batch();
        let inserted = records
            .into_iter()
            .map(|record| self.ingest(record))
            .filter(|outcome| outcome.is_inserted())
            .count();
        self.shared.end_batch();
        inserted
    }

    /// Change the retention limit, trimming the oldest records immediately.
    ///
    /// A zero capacity is rejected and the current capacity stays in effect.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), TapeError> {
        let capacity = config::validate_capacity(capacity)?;
        if !self.shared.supports_live_trades {
            return Ok(());
        }

        let evicted = {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return Ok(());
            }
            let evicted = state.window.set_capacity(capacity);
            if evicted > 0 {
                state.revision += 1;
                state.dirty = true;
            }
            evicted
        };

        if evicted > 0 {
            tracing::debug!(
                "Tape {} trimmed {} trades to capacity {}",
                self.shared.market,
                evicted,
                capacity
            );
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    /// Record a change in upstream health and notify if it changed.
    pub(crate) fn set_status(&self, status: StreamStatus) {
        let changed = {
            let mut state = self.shared.state.lock();
            if state.destroyed
                || state.status == status
                || state.status == StreamStatus::Unsupported
            {
                false
            } else {
                state.status = status;
                state.revision += 1;
                state.dirty = true;
                true
            }
        };
        if changed {
            self.shared.wake.notify_one();
        }
    }

    // ── Reading ──────────────────────────────────────────────────────────

    /// Independent copy of the current contents, oldest first.
    pub fn snapshot(&self) -> TapeSnapshot {
        let state = self.shared.state.lock();
        TapeSnapshot {
            market: self.shared.market.clone(),
            status: state.status,
            supports_live_trades: self.shared.supports_live_trades,
            capacity: state.window.capacity(),
            revision: state.revision,
            trades: state.window.to_vec(),
        }
    }

    // ── Listeners ────────────────────────────────────────────────────────

    /// Register a listener for coalesced updates.
    ///
    /// Listeners run on the tape's dispatcher task in registration order.
    /// The returned handle unsubscribes when disposed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&TapeUpdate) + Send + Sync + 'static,
    {
        self.shared.listeners.add(Box::new(listener))
    }

    /// Remove a listener by id. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    fn apply_feed_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Trade(raw) => {
                if let Err(e) = self.ingest_raw(raw) {
                    tracing::warn!("Rejected trade on {}: {}", self.market(), e);
                }
            }
            FeedEvent::Connected => {
                tracing::info!("Trade feed for {} connected", self.market());
                self.set_status(StreamStatus::Live);
            }
            FeedEvent::Disconnected { reason } => {
                tracing::warn!("Trade feed for {} disconnected: {}", self.market(), reason);
                self.set_status(StreamStatus::Degraded);
            }
            FeedEvent::Error(message) => {
                tracing::warn!("Trade feed for {} errored: {}", self.market(), message);
                self.set_status(StreamStatus::Degraded);
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────

    /// Release the upstream feed and drop all listeners.
    ///
    /// Later ingests are no-ops. Calling this more than once has no effect.
    pub fn destroy(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.dirty = false;
        }

        if let Some(link) = self.shared.feed.lock().take() {
            link.pump.abort();
            link.feed.unsubscribe(&self.shared.market);
        }
        if let Some(handle) = self.shared.dispatcher.lock().take() {
            handle.abort();
        }
        self.shared.listeners.clear();
        tracing::debug!("Tape {} destroyed", self.shared.market);
    }
}

impl std::fmt::Debug for TradeTape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TradeTape")
            .field("market", &self.shared.market)
            .field("status", &state.status)
            .field("len", &state.window.len())
            .field("capacity", &state.window.capacity())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

// ─── Background tasks ────────────────────────────────────────────────────────

impl Shared {
    /// Deliver one update if anything changed since the last delivery.
    /// Returns `false` once the tape is destroyed.
    fn flush(&self) -> bool {
        let update = {
            let mut state = self.state.lock();
            if state.destroyed {
                return false;
            }
            if state.batch_depth > 0 || !std::mem::take(&mut state.dirty) {
                return true;
            }
            TapeUpdate {
                market: self.market.clone(),
                status: state.status,
                len: state.window.len(),
                revision: state.revision,
            }
        };
        self.listeners.emit(&update);
        true
    }

    fn begin_batch(&self) {
        self.state.lock().batch_depth += 1;
    }

    /// Close a batch and schedule one delivery for everything it changed.
    fn end_batch(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.batch_depth = state.batch_depth.saturating_sub(1);
            state.batch_depth == 0 && state.dirty && !state.destroyed
        };
        if pending {
            self.wake.notify_one();
        }
    }
}

async fn dispatch_loop(tape: Weak<Shared>, wake: Arc<Notify>) {
    loop {
        // Permits coalesce: any number of wakes while we are busy or asleep
        // count as one.
        wake.notified().await;
        // Let the rest of the current burst land before delivering.
        tokio::task::yield_now().await;

        let Some(shared) = tape.upgrade() else {
            return;
        };
        if !shared.flush() {
            return;
        }
    }
}

/// Upper bound on feed events applied per batch.
const FEED_BATCH: usize = 1024;

async fn pump(tape: Weak<Shared>, events: FeedStream) {
    // A burst the feed queued in one turn is drained in one pass. Without
    // `unconstrained` the cooperative budget would split it across turns
    // and the dispatcher would deliver between the pieces.
    let mut batches = events.ready_chunks(FEED_BATCH);
    while let Some(batch) = tokio::task::unconstrained(batches.next()).await {
        let Some(shared) = tape.upgrade() else {
            return;
        };
        let tape = TradeTape { shared };

        tape.shared.begin_batch();
        for event in batch {
            tape.apply_feed_event(event);
        }
        tape.shared.end_batch();
    }

    if let Some(shared) = tape.upgrade() {
        let tape = TradeTape { shared };
        if !tape.is_destroyed() {
            tracing::warn!("Trade feed for {} ended", tape.market());
            tape.set_status(StreamStatus::Degraded);
        }
    }
}
