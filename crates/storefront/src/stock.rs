//! Short-lived cache of summed stock levels.
//!
//! One snapshot for the whole catalog, replaced wholesale on refresh. The
//! snapshot is stale after [`STOCK_TTL_SECS`] or after [`StockCache::invalidate`],
//! which the cart calls after any mutation that changes demand.
//!
//! Concurrent readers that all find the snapshot stale will each fetch; the
//! last write wins.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use pickpack_core::ProductId;
use tracing::{debug, instrument, warn};

use crate::api::types::StockMap;
use crate::api::{ApiClient, ApiError, FULL_CATALOG_PAGE_SIZE};

/// Snapshot lifetime in seconds.
pub const STOCK_TTL_SECS: i64 = 60;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and replay tools.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    levels: StockMap,
    fetched_at: DateTime<Utc>,
}

/// Shared stock snapshot with a fixed TTL.
///
/// Cheap to clone; clones share the snapshot.
#[derive(Clone)]
pub struct StockCache {
    inner: Arc<StockCacheInner>,
}

struct StockCacheInner {
    api: ApiClient,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    snapshot: RwLock<Option<Snapshot>>,
}

impl StockCache {
    /// Create a cache over the wall clock.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_clock(api, Arc::new(SystemClock))
    }

    /// Create a cache over an injected clock.
    #[must_use]
    pub fn with_clock(api: ApiClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StockCacheInner {
                api,
                clock,
                ttl: TimeDelta::seconds(STOCK_TTL_SECS),
                snapshot: RwLock::new(None),
            }),
        }
    }

    fn fresh_snapshot(&self) -> Option<StockMap> {
        let now = self.inner.clock.now();
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|snapshot| now - snapshot.fetched_at < self.inner.ttl)
            .map(|snapshot| snapshot.levels.clone())
    }

    fn cached_snapshot(&self) -> Option<StockMap> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|snapshot| snapshot.levels.clone())
    }

    /// Stock levels, refreshing when stale.
    ///
    /// On refresh failure the previous snapshot is served, however old.
    ///
    /// # Errors
    ///
    /// Returns an error only when the refresh fails and nothing was ever
    /// cached.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<StockMap, ApiError> {
        if let Some(levels) = self.fresh_snapshot() {
            debug!("Stock cache hit");
            return Ok(levels);
        }

        match self.inner.api.fetch_stock_levels(1, FULL_CATALOG_PAGE_SIZE).await {
            Ok(records) => {
                let levels = StockMap::from_records(&records);
                debug!(products = levels.len(), "Stock levels refreshed");
                *self
                    .inner
                    .snapshot
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Snapshot {
                    levels: levels.clone(),
                    fetched_at: self.inner.clock.now(),
                });
                Ok(levels)
            }
            Err(e) => {
                if let Some(stale) = self.cached_snapshot() {
                    warn!(error = %e, "Stock refresh failed, serving stale levels");
                    Ok(stale)
                } else {
                    warn!(error = %e, "Stock refresh failed with nothing cached");
                    Err(e)
                }
            }
        }
    }

    /// Stock levels, never failing: an empty map when nothing is available.
    pub async fn get_stock_map(&self) -> StockMap {
        self.load().await.unwrap_or_default()
    }

    /// Available quantity for one product, if the snapshot reports it.
    pub async fn available(&self, product_id: &ProductId) -> Option<i64> {
        self.get_stock_map().await.available(product_id)
    }

    /// Drop the snapshot so the next read fetches.
    pub fn invalidate(&self) {
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Stock cache invalidated");
    }
}
