//! Trade window — the bounded, time-ordered buffer behind every tape.

use super::TradeRecord;
use crate::shared::MarketId;
use std::collections::VecDeque;

/// Result of offering one record to a window or tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stored in chronological position.
    Inserted,
    /// Older than everything retained while at capacity; dropped.
    Stale,
    /// Same `trade_id` and `executed_at` as a retained record; dropped.
    Duplicate,
    /// The tape was destroyed; nothing stored.
    Closed,
    /// The market has no live trade feed; nothing stored.
    Unsupported,
    /// The record belongs to a different market.
    Rejected,
}

impl IngestOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, IngestOutcome::Inserted)
    }
}

/// Rolling window of the most recent trades for one market.
///
/// Records are kept oldest-first, sorted by `executed_at` with ties in
/// arrival order. Length never exceeds `capacity` once a call returns.
#[derive(Debug, Clone)]
pub struct TradeWindow {
    pub market: MarketId,
    trades: VecDeque<TradeRecord>,
    capacity: usize,
}

impl TradeWindow {
    pub fn new(market: MarketId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            market,
            trades: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a trade in chronological position, evicting from the oldest end.
    pub fn push(&mut self, trade: TradeRecord) -> IngestOutcome {
        if self.is_full() {
            if let Some(oldest) = self.trades.front() {
                if trade.executed_at < oldest.executed_at {
                    return IngestOutcome::Stale;
                }
            }
        }

        // First index whose time is strictly later: ties land after earlier arrivals.
        let idx = self
            .trades
            .partition_point(|t| t.executed_at <= trade.executed_at);

        if !trade.trade_id.is_empty()
            && self
                .trades
                .range(..idx)
                .rev()
                .take_while(|t| t.executed_at == trade.executed_at)
                .any(|t| t.trade_id == trade.trade_id)
        {
            return IngestOutcome::Duplicate;
        }

        if idx == self.trades.len() {
            self.trades.push_back(trade);
        } else {
            self.trades.insert(idx, trade);
        }
        self.trim();
        IngestOutcome::Inserted
    }

    /// Change the retention limit. Returns how many records were evicted.
    ///
    /// Callers validate `capacity`; zero is clamped to one.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        self.trim()
    }

    fn trim(&mut self) -> usize {
        let excess = self.trades.len().saturating_sub(self.capacity);
        self.trades.drain(..excess);
        excess
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn trades(&self) -> &VecDeque<TradeRecord> {
        &self.trades
    }

    /// Independent copy, oldest first.
    pub fn to_vec(&self) -> Vec<TradeRecord> {
        self.trades.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&TradeRecord> {
        self.trades.back()
    }

    pub fn oldest(&self) -> Option<&TradeRecord> {
        self.trades.front()
    }

    pub fn is_full(&self) -> bool {
        self.trades.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
