//! # Trade Tape
//!
//! Live, per-market trade tapes for a trade history pane.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Newtypes, trade records, market metadata (no I/O)
//! 2. **Feed** — The upstream trade feed seam and an in-process channel feed
//! 3. **Tape** — Bounded, time-ordered trade windows with coalesced notifications
//! 4. **Registry** — One shared tape per market, reference counted
//! 5. **View** — The headless pane controller that follows a market
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trade_tape::prelude::*;
//!
//! let feed = Arc::new(ChannelFeed::new());
//! let registry = TapeRegistry::builder().feed(feed).number_of_trades(100).build()?;
//! let view = TradeHistoryView::new(registry, Arc::new(directory));
//!
//! view.open_uri("via://trade-history/BTC-USD").await?;
//! let snapshot = view.snapshot();
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Crate error type.
pub mod error;

/// Tape configuration and validation.
pub mod config;

// ── Layer 2: Feed ────────────────────────────────────────────────────────────

/// Upstream trade feed abstraction.
pub mod feed;

// ── Layers 3-4: Tape + Registry ──────────────────────────────────────────────

/// Trade tapes, snapshots, listeners and the tape registry.
pub mod tape;

// ── Layer 5: View ────────────────────────────────────────────────────────────

/// `TradeHistoryView`, the pane controller.
pub mod view;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{MarketId, Side, BASE_URI};

    // Domain types
    pub use crate::domain::market::{
        CachingDirectory, Capabilities, Market, MarketDirectory, StaticDirectory,
    };
    pub use crate::domain::trade::wire::{FeedMessage, RawTrade};
    pub use crate::domain::trade::{IngestOutcome, TradeRecord, TradeWindow};

    // Feed
    pub use crate::feed::{ChannelFeed, FeedEvent, FeedStream, TradeFeed};

    // Tape + registry
    pub use crate::tape::{
        ListenerHandle, ListenerId, StreamStatus, TapeRegistry, TapeRegistryBuilder, TapeSnapshot,
        TapeUpdate, TradeRow, TradeTape,
    };

    // View
    pub use crate::view::{SwitchOutcome, TradeHistoryView};

    // Config + errors
    pub use crate::config::{TapeConfig, DEFAULT_NUMBER_OF_TRADES};
    pub use crate::error::TapeError;
}
