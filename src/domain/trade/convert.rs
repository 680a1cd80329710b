//! Conversions from wire types to domain types for trades.

use super::wire::RawTrade;
use super::TradeRecord;
use crate::error::TapeError;
use crate::shared::MarketId;
use chrono::TimeZone;
use rust_decimal::Decimal;
use std::str::FromStr;

impl RawTrade {
    /// Validate and convert into a record for `market`.
    ///
    /// A record that names a different market is rejected. A missing
    /// `trade_id` is tolerated and stored as empty (such records are never
    /// treated as redeliveries).
    pub fn into_record(self, market: &MarketId) -> Result<TradeRecord, TapeError> {
        if let Some(named) = &self.market {
            if named != market {
                return Err(TapeError::MalformedTrade(format!(
                    "trade for {} delivered on {} feed",
                    named, market
                )));
            }
        }

        let price = parse_decimal("price", self.price)?;
        let size = parse_decimal("size", self.size)?;
        let side = self.side.ok_or_else(|| TapeError::missing_field("side"))?;
        let millis = self
            .executed_at
            .ok_or_else(|| TapeError::missing_field("executed_at"))?;

        if price.is_sign_negative() {
            return Err(TapeError::MalformedTrade(format!("negative price {}", price)));
        }
        if size <= Decimal::ZERO {
            return Err(TapeError::MalformedTrade(format!("non-positive size {}", size)));
        }

        let executed_at = chrono::Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| TapeError::MalformedTrade(format!("invalid timestamp {}", millis)))?;

        Ok(TradeRecord {
            market: market.clone(),
            trade_id: self.trade_id.unwrap_or_default(),
            price,
            size,
            side,
            executed_at,
        })
    }
}

impl TryFrom<RawTrade> for TradeRecord {
    type Error = TapeError;

    fn try_from(raw: RawTrade) -> Result<Self, Self::Error> {
        let market = raw
            .market
            .clone()
            .ok_or_else(|| TapeError::missing_field("market"))?;
        raw.into_record(&market)
    }
}

fn parse_decimal(field: &str, value: Option<String>) -> Result<Decimal, TapeError> {
    let value = value.ok_or_else(|| TapeError::missing_field(field))?;
    Decimal::from_str(value.trim())
        .map_err(|e| TapeError::MalformedTrade(format!("bad {} {:?}: {}", field, value, e)))
}
