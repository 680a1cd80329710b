//! Point-in-time tape snapshots and size-scaled rows for rendering.

use super::StreamStatus;
use crate::domain::trade::TradeRecord;
use crate::shared::MarketId;
use rust_decimal::Decimal;
use serde::Serialize;

/// Independent copy of a tape's contents at one revision.
///
/// `trades` is ordered oldest → newest on every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TapeSnapshot {
    pub market: MarketId,
    pub status: StreamStatus,
    pub supports_live_trades: bool,
    pub capacity: usize,
    pub revision: u64,
    pub trades: Vec<TradeRecord>,
}

/// One trade paired with its size relative to the largest trade shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRow<'a> {
    pub trade: &'a TradeRecord,
    /// `size / max_size`, in `[0, 1]`.
    pub size_ratio: Decimal,
}

impl TapeSnapshot {
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn latest(&self) -> Option<&TradeRecord> {
        self.trades.last()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TradeRecord> {
        self.trades.iter()
    }

    /// Largest trade size in the snapshot.
    pub fn max_size(&self) -> Option<Decimal> {
        self.trades.iter().map(|t| t.size).max()
    }

    /// Rows in snapshot order, each scaled against the largest size.
    pub fn rows(&self) -> Vec<TradeRow<'_>> {
        let max = self.max_size().unwrap_or(Decimal::ZERO);
        self.trades
            .iter()
            .map(|trade| TradeRow {
                trade,
                size_ratio: if max.is_zero() {
                    Decimal::ZERO
                } else {
                    trade.size / max
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Side;
    use chrono::Utc;
    use std::str::FromStr;

    fn trade(size: &str) -> TradeRecord {
        TradeRecord {
            market: MarketId::from("ob1"),
            trade_id: size.to_string(),
            price: Decimal::ONE_HUNDRED,
            size: Decimal::from_str(size).unwrap(),
            side: Side::Sell,
            executed_at: Utc::now(),
        }
    }

    fn snapshot(trades: Vec<TradeRecord>) -> TapeSnapshot {
        TapeSnapshot {
            market: MarketId::from("ob1"),
            status: StreamStatus::Live,
            supports_live_trades: true,
            capacity: 10,
            revision: 1,
            trades,
        }
    }

    #[test]
    fn test_rows_scale_against_largest() {
        let snap = snapshot(vec![trade("1"), trade("4"), trade("2")]);
        let ratios: Vec<_> = snap.rows().iter().map(|r| r.size_ratio).collect();
        assert_eq!(
            ratios,
            vec![
                Decimal::from_str("0.25").unwrap(),
                Decimal::ONE,
                Decimal::from_str("0.5").unwrap(),
            ]
        );
        assert_eq!(snap.latest().unwrap().trade_id, "2");
    }

    #[test]
    fn test_empty_snapshot() {
        let snap = snapshot(vec![]);
        assert!(snap.rows().is_empty());
        assert_eq!(snap.max_size(), None);
        assert!(snap.latest().is_none());
    }
}
