//! Trade history view — the headless controller behind a trade history pane.
//!
//! Holds at most one tape reference at a time and follows the market the
//! pane displays. Market switches may suspend while the market resolves;
//! every switch takes a generation number, and a resolution that completes
//! after a newer switch started is discarded before any tape is acquired.

use crate::domain::market::{Market, MarketDirectory};
use crate::error::TapeError;
use crate::shared::{MarketId, BASE_URI};
use crate::tape::{
    ListenerHandle, StreamStatus, TapeRegistry, TapeSnapshot, TapeUpdate, TradeTape,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Callback invoked with each fresh snapshot.
pub type RedrawFn = dyn Fn(&TapeSnapshot) + Send + Sync;

/// How a market switch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The view now displays the requested market.
    Applied,
    /// A newer switch (or teardown) overtook this one; nothing changed.
    Superseded,
}

struct Active {
    market: Market,
    tape: TradeTape,
    listener: ListenerHandle,
}

#[derive(Default)]
struct ViewState {
    generation: u64,
    desired: Option<MarketId>,
    active: Option<Active>,
    snapshot: Option<TapeSnapshot>,
    redraws: u64,
    closed: bool,
}

/// Headless trade history pane.
pub struct TradeHistoryView {
    registry: Arc<TapeRegistry>,
    directory: Arc<dyn MarketDirectory>,
    state: Arc<Mutex<ViewState>>,
    redraw: Option<Arc<RedrawFn>>,
}

impl TradeHistoryView {
    pub fn new(registry: Arc<TapeRegistry>, directory: Arc<dyn MarketDirectory>) -> Self {
        Self {
            registry,
            directory,
            state: Arc::new(Mutex::new(ViewState::default())),
            redraw: None,
        }
    }

    /// Render hook called after every snapshot the view applies.
    pub fn with_redraw<F>(mut self, redraw: F) -> Self
    where
        F: Fn(&TapeSnapshot) + Send + Sync + 'static,
    {
        self.redraw = Some(Arc::new(redraw));
        self
    }

    /// Open the market named by a pane URI.
    ///
    /// The bare base URI selects nothing and returns `Ok(None)`.
    pub async fn open_uri(&self, uri: &str) -> Result<Option<SwitchOutcome>, TapeError> {
        match MarketId::from_uri(uri) {
            Some(id) => self.change_market(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Display `id`: resolve it, acquire its tape, re-subscribe, re-snapshot.
    ///
    /// Returns `Superseded` when a later call (or `close`) overtook this one
    /// while the market was resolving.
    pub async fn change_market(&self, id: MarketId) -> Result<SwitchOutcome, TapeError> {
        let generation = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(SwitchOutcome::Superseded);
            }
            state.generation += 1;
            state.desired = Some(id.clone());
            state.generation
        };

        let resolved = self.directory.resolve(&id).await;

        // Everything from the generation check to the swap happens under the
        // view lock with no await in between, so nothing can supersede this
        // switch once it passes the check and a stale switch never takes a
        // tape hold.
        let (market, snapshot, previous) = {
            let mut state = self.state.lock();
            if state.generation != generation || state.closed {
                tracing::debug!("Discarding stale resolution of {}", id);
                return Ok(SwitchOutcome::Superseded);
            }
            let market = match resolved {
                Ok(market) => market,
                Err(e) => {
                    // The old market stays on screen; keep reporting it.
                    state.desired = state.active.as_ref().map(|a| a.market.id.clone());
                    return Err(e);
                }
            };

            let tape = self.registry.acquire(&market);
            let listener = tape.subscribe(on_update(
                Arc::downgrade(&self.state),
                market.id.clone(),
                self.redraw.clone(),
            ));
            let snapshot = tape.snapshot();
            state.snapshot = Some(snapshot.clone());
            state.redraws += 1;
            let previous = state.active.replace(Active {
                market: market.clone(),
                tape,
                listener,
            });
            (market, snapshot, previous)
        };

        if let Some(redraw) = &self.redraw {
            redraw(&snapshot);
        }
        if let Some(previous) = previous {
            previous.listener.dispose();
            self.registry.release(&previous.market.id);
        }
        tracing::info!("Trade history now showing {}", market.id);
        Ok(SwitchOutcome::Applied)
    }

    /// Release the held tape and ignore any in-flight switch.
    pub fn close(&self) {
        let active = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.generation += 1;
            state.active.take()
        };
        if let Some(active) = active {
            active.listener.dispose();
            self.registry.release(&active.market.id);
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Market currently displayed.
    pub fn market(&self) -> Option<Market> {
        self.state.lock().active.as_ref().map(|a| a.market.clone())
    }

    /// Market most recently requested (may still be resolving). After a
    /// failed switch this is the market still displayed.
    pub fn desired_market(&self) -> Option<MarketId> {
        self.state.lock().desired.clone()
    }

    pub fn tape(&self) -> Option<TradeTape> {
        self.state.lock().active.as_ref().map(|a| a.tape.clone())
    }

    /// Last snapshot applied.
    pub fn snapshot(&self) -> Option<TapeSnapshot> {
        self.state.lock().snapshot.clone()
    }

    pub fn status(&self) -> Option<StreamStatus> {
        self.state.lock().snapshot.as_ref().map(|s| s.status)
    }

    /// How many snapshots the view has applied.
    pub fn redraw_count(&self) -> u64 {
        self.state.lock().redraws
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn title(&self) -> String {
        match &self.state.lock().active {
            Some(active) => active.market.title(),
            None => "Trade History".to_string(),
        }
    }

    pub fn uri(&self) -> String {
        match &self.state.lock().desired {
            Some(id) => id.to_uri(),
            None => BASE_URI.to_string(),
        }
    }
}

impl Drop for TradeHistoryView {
    fn drop(&mut self) {
        self.close();
    }
}

/// Listener installed on the active tape: re-snapshot and redraw, but only
/// while `market` is still the one displayed.
fn on_update(
    state: Weak<Mutex<ViewState>>,
    market: MarketId,
    redraw: Option<Arc<RedrawFn>>,
) -> impl Fn(&TapeUpdate) + Send + Sync + 'static {
    move |_update: &TapeUpdate| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let snapshot = {
            let mut state = state.lock();
            let Some(active) = state.active.as_ref().filter(|a| a.market.id == market) else {
                return;
            };
            let snapshot = active.tape.snapshot();
            state.snapshot = Some(snapshot.clone());
            state.redraws += 1;
            snapshot
        };
        if let Some(redraw) = &redraw {
            redraw(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Capabilities, StaticDirectory};
    use crate::feed::ChannelFeed;
    use std::time::Duration;

    fn setup() -> (Arc<ChannelFeed>, Arc<TapeRegistry>, Arc<StaticDirectory>) {
        let feed = Arc::new(ChannelFeed::new());
        let registry = TapeRegistry::builder()
            .feed(feed.clone())
            .number_of_trades(10)
            .build()
            .unwrap();
        let directory = Arc::new(
            StaticDirectory::new()
                .with_market(Market::new("A", "Alpha", Capabilities::live_trades()))
                .with_market(Market::new("B", "Beta", Capabilities::live_trades())),
        );
        (feed, registry, directory)
    }

    #[tokio::test]
    async fn test_switch_releases_previous_tape() {
        let (feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry.clone(), directory);

        assert_eq!(
            view.change_market(MarketId::from("A")).await.unwrap(),
            SwitchOutcome::Applied
        );
        assert_eq!(view.title(), "Trade History: Alpha");
        assert_eq!(registry.holders(&MarketId::from("A")), 1);

        view.change_market(MarketId::from("B")).await.unwrap();
        assert!(!registry.contains(&MarketId::from("A")));
        assert_eq!(feed.unsubscribe_count(&MarketId::from("A")), 1);
        assert_eq!(registry.holders(&MarketId::from("B")), 1);
        assert_eq!(view.uri(), "via://trade-history/B");
    }

    #[tokio::test]
    async fn test_same_market_switch_keeps_tape() {
        let (feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry.clone(), directory);
        view.change_market(MarketId::from("A")).await.unwrap();
        let tape = view.tape().unwrap();

        view.change_market(MarketId::from("A")).await.unwrap();
        assert!(tape.ptr_eq(&view.tape().unwrap()));
        assert_eq!(registry.holders(&MarketId::from("A")), 1);
        assert_eq!(feed.subscribe_count(&MarketId::from("A")), 1);
        assert_eq!(tape.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_market_is_an_error_and_keeps_current() {
        let (_feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry.clone(), directory);
        view.change_market(MarketId::from("A")).await.unwrap();

        let err = view.change_market(MarketId::from("Z")).await.unwrap_err();
        assert!(matches!(err, TapeError::UnknownMarket(_)));
        assert_eq!(view.market().unwrap().id.as_str(), "A");
        assert_eq!(registry.holders(&MarketId::from("A")), 1);
        assert_eq!(view.uri(), "via://trade-history/A");
        assert_eq!(view.desired_market(), Some(MarketId::from("A")));
    }

    #[tokio::test]
    async fn test_failed_first_switch_selects_nothing() {
        let (_feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry.clone(), directory);

        assert!(view.change_market(MarketId::from("Z")).await.is_err());
        assert_eq!(view.uri(), "via://trade-history");
        assert_eq!(view.desired_market(), None);
        assert_eq!(view.title(), "Trade History");
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_switches_leave_one_hold() {
        let (_feed, registry, _) = setup();
        let directory = Arc::new(
            StaticDirectory::new()
                .with_market(Market::new("A", "Alpha", Capabilities::live_trades()))
                .with_market(Market::new("B", "Beta", Capabilities::live_trades()))
                .with_market(Market::new("C", "Gamma", Capabilities::live_trades()))
                .with_delay("A", Duration::from_millis(2))
                .with_delay("C", Duration::from_millis(1)),
        );
        let view = Arc::new(TradeHistoryView::new(registry.clone(), directory));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            for id in ["A", "B", "C"] {
                let view = Arc::clone(&view);
                tasks.push(tokio::spawn(async move {
                    view.change_market(MarketId::from(id)).await
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let shown = view.market().unwrap().id;
        assert_eq!(registry.markets(), vec![shown.clone()]);
        assert_eq!(registry.holders(&shown), 1);
        assert_eq!(view.desired_market(), Some(shown));
        assert_eq!(view.tape().unwrap().listener_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_tape() {
        let (feed, registry, directory) = setup();
        {
            let view = TradeHistoryView::new(registry.clone(), directory);
            view.change_market(MarketId::from("A")).await.unwrap();
        }
        assert!(registry.is_empty());
        assert_eq!(feed.unsubscribe_count(&MarketId::from("A")), 1);
    }

    #[tokio::test]
    async fn test_open_bare_uri_selects_nothing() {
        let (_feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry, directory);
        assert_eq!(view.open_uri("via://trade-history").await.unwrap(), None);
        assert_eq!(
            view.open_uri("via://trade-history/A").await.unwrap(),
            Some(SwitchOutcome::Applied)
        );
        assert_eq!(view.title(), "Trade History: Alpha");
    }

    #[tokio::test]
    async fn test_updates_redraw_with_fresh_snapshot() {
        let (feed, registry, directory) = setup();
        let drawn = Arc::new(Mutex::new(Vec::new()));
        let sink = drawn.clone();
        let view = TradeHistoryView::new(registry, directory)
            .with_redraw(move |snap| sink.lock().push(snap.len()));
        view.change_market(MarketId::from("A")).await.unwrap();

        let market = MarketId::from("A");
        for n in 1..=3 {
            feed.publish_text(
                &market,
                &format!(
                    r#"{{"type":"trade","data":{{"trade_id":"t{n}","price":"10","size":"1","side":"buy","executed_at":{n}}}}}"#
                ),
            )
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(view.snapshot().unwrap().len(), 3);
        assert_eq!(*drawn.lock().first().unwrap(), 0);
        assert_eq!(*drawn.lock().last().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_closed_view_ignores_switches() {
        let (_feed, registry, directory) = setup();
        let view = TradeHistoryView::new(registry.clone(), directory);
        view.close();
        assert_eq!(
            view.change_market(MarketId::from("A")).await.unwrap(),
            SwitchOutcome::Superseded
        );
        assert!(registry.is_empty());
    }
}
