//! Market directory — async market resolution and metadata caching.

use super::Market;
use crate::error::TapeError;
use crate::shared::MarketId;
use async_lock::RwLock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resolves a market identifier into a `Market` with its capabilities.
///
/// Resolution may suspend (metadata fetch, symbol registry warm-up).
#[async_trait]
pub trait MarketDirectory: Send + Sync {
    async fn resolve(&self, id: &MarketId) -> Result<Market, TapeError>;
}

#[async_trait]
impl<D: MarketDirectory + ?Sized> MarketDirectory for Arc<D> {
    async fn resolve(&self, id: &MarketId) -> Result<Market, TapeError> {
        (**self).resolve(id).await
    }
}

// ─── StaticDirectory ─────────────────────────────────────────────────────────

/// In-memory directory with optional per-market resolution latency.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    markets: HashMap<MarketId, Market>,
    delays: HashMap<MarketId, Duration>,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(mut self, market: Market) -> Self {
        self.markets.insert(market.id.clone(), market);
        self
    }

    /// Delay resolution of `id` by `delay`.
    pub fn with_delay(mut self, id: impl Into<MarketId>, delay: Duration) -> Self {
        self.delays.insert(id.into(), delay);
        self
    }

    /// Number of `resolve` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDirectory for StaticDirectory {
    async fn resolve(&self, id: &MarketId) -> Result<Market, TapeError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }
        self.markets
            .get(id)
            .cloned()
            .ok_or_else(|| TapeError::UnknownMarket(id.clone()))
    }
}

// ─── CachingDirectory ────────────────────────────────────────────────────────

/// TTL cache in front of another directory.
pub struct CachingDirectory<D> {
    inner: D,
    ttl: Duration,
    cache: RwLock<HashMap<MarketId, (Market, Instant)>>,
}

impl<D: MarketDirectory> CachingDirectory<D> {
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Invalidate a cached market.
    pub async fn invalidate(&self, id: &MarketId) {
        self.cache.write().await.remove(id);
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: MarketDirectory> MarketDirectory for CachingDirectory<D> {
    async fn resolve(&self, id: &MarketId) -> Result<Market, TapeError> {
        {
            let cache = self.cache.read().await;
            if let Some((market, fetched_at)) = cache.get(id) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(market.clone());
                }
            }
        }

        let market = self.inner.resolve(id).await?;
        self.cache
            .write()
            .await
            .insert(id.clone(), (market.clone(), Instant::now()));
        Ok(market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Capabilities;

    fn directory() -> StaticDirectory {
        StaticDirectory::new().with_market(Market::new("A", "Alpha", Capabilities::live_trades()))
    }

    #[tokio::test]
    async fn test_static_resolve() {
        let dir = directory();
        let market = dir.resolve(&MarketId::from("A")).await.unwrap();
        assert_eq!(market.name, "Alpha");

        let err = dir.resolve(&MarketId::from("B")).await.unwrap_err();
        assert!(matches!(err, TapeError::UnknownMarket(id) if id.as_str() == "B"));
    }

    #[tokio::test]
    async fn test_caching_directory_hits_cache() {
        let dir = CachingDirectory::new(directory(), Duration::from_secs(60));
        let id = MarketId::from("A");
        dir.resolve(&id).await.unwrap();
        dir.resolve(&id).await.unwrap();
        assert_eq!(dir.inner().lookups(), 1);

        dir.invalidate(&id).await;
        dir.resolve(&id).await.unwrap();
        assert_eq!(dir.inner().lookups(), 2);
    }

    #[tokio::test]
    async fn test_caching_directory_zero_ttl_always_refetches() {
        let dir = CachingDirectory::new(directory(), Duration::ZERO);
        let id = MarketId::from("A");
        dir.resolve(&id).await.unwrap();
        dir.resolve(&id).await.unwrap();
        assert_eq!(dir.inner().lookups(), 2);
    }

    #[tokio::test]
    async fn test_caching_directory_does_not_cache_errors() {
        let dir = CachingDirectory::new(directory(), Duration::from_secs(60));
        let id = MarketId::from("missing");
        assert!(dir.resolve(&id).await.is_err());
        assert!(dir.resolve(&id).await.is_err());
        assert_eq!(dir.inner().lookups(), 2);
    }
}
