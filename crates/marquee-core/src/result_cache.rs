//! Whole-result caching middleware for sources.
//!
//! A miss drains the wrapped source completely and stores the list; a hit
//! replays the stored list without touching the wrapped source. Entries are
//! keyed by descriptor plus the canonical [`QueryWindow::cache_key`].
//!
//! ```rust,ignore
//! use marquee_core::{result_cache, ResultCacheConfig, SourceRegistry};
//!
//! let registry = SourceRegistry::builder()
//!     .with_source("hollywood-theatre", hollywood, [result_cache(ResultCacheConfig::default())?])
//!     .build();
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::lru::LruMap;
use crate::source::{FixtureSupport, ListingStream, Source, SourceMiddleware};
use crate::{CacheInitError, FetchError, ListingItem, QueryWindow};

/// Capacity and freshness limits for a [`ResultCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCacheConfig {
    /// Maximum number of cached results; must be non-zero.
    pub capacity: usize,
    /// Entry lifetime. `Duration::ZERO` disables time-based expiry.
    pub ttl: Duration,
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl: Duration::from_secs(300),
        }
    }
}

impl ResultCacheConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, CacheInitError> {
        Self { capacity, ttl }.validated()
    }

    fn validated(self) -> Result<Self, CacheInitError> {
        if self.capacity == 0 {
            return Err(CacheInitError::ZeroCapacity { cache: "result" });
        }
        Ok(self)
    }
}

/// Hit/miss counters for a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries dropped because their TTL had passed.
    pub expirations: u64,
}

#[derive(Debug)]
struct CachedListing {
    items: Arc<Vec<ListingItem>>,
    stored_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    entries: LruMap<String, CachedListing>,
    ttl: Duration,
    stats: CacheStats,
}

impl CacheInner {
    fn lookup(&mut self, key: &String) -> Option<Arc<Vec<ListingItem>>> {
        let found = self
            .entries
            .get(key)
            .map(|entry| (Arc::clone(&entry.items), entry.stored_at));

        match found {
            Some((items, stored_at)) if self.ttl.is_zero() || stored_at.elapsed() < self.ttl => {
                self.stats.hits += 1;
                Some(items)
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.expirations += 1;
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    fn store(&mut self, key: String, items: Arc<Vec<ListingItem>>) {
        let entry = CachedListing {
            items,
            stored_at: Instant::now(),
        };
        if let Some((evicted, _)) = self.entries.insert(key, entry) {
            self.stats.evictions += 1;
            debug!(key = %evicted, "result cache evicted least recently used entry");
        }
    }
}

/// Source wrapper that caches complete fetch results (LRU + TTL).
pub struct ResultCache {
    descriptor: String,
    inner: Arc<dyn Source>,
    store: Mutex<CacheInner>,
}

impl ResultCache {
    /// Wraps `inner`, keeping its descriptor and fixture capability.
    pub fn wrap(inner: Arc<dyn Source>, config: ResultCacheConfig) -> Result<Self, CacheInitError> {
        Ok(Self::with_checked_config(inner, config.validated()?))
    }

    fn with_checked_config(inner: Arc<dyn Source>, config: ResultCacheConfig) -> Self {
        Self {
            descriptor: inner.descriptor(),
            inner,
            store: Mutex::new(CacheInner {
                entries: LruMap::new(config.capacity),
                ttl: config.ttl,
                stats: CacheStats::default(),
            }),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.lock().await.stats
    }

    /// Number of stored results, including ones not yet found expired.
    pub async fn len(&self) -> usize {
        self.store.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.store.lock().await.entries.clear();
    }

    fn key_for(&self, window: &QueryWindow) -> String {
        format!("{}:{}", self.descriptor, window.cache_key())
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Source for ResultCache {
    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    fn fetch(
        &self,
        cancel: CancellationToken,
        window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        Box::pin(async move {
            let key = self.key_for(&window);

            let cached = self.store.lock().await.lookup(&key);
            if let Some(items) = cached {
                debug!(key = %key, items = items.len(), "result cache hit");
                return Ok(replay(items));
            }
            debug!(key = %key, "result cache miss");

            let stream = self.inner.fetch(cancel.clone(), window).await?;
            let items = Arc::new(
                stream
                    .take_until(cancel.clone().cancelled_owned())
                    .collect::<Vec<_>>()
                    .await,
            );

            if cancel.is_cancelled() {
                debug!(key = %key, items = items.len(), "fetch cancelled mid-stream, not caching");
            } else {
                self.store.lock().await.store(key, Arc::clone(&items));
            }

            Ok(replay(items))
        })
    }

    fn fixtures(&self) -> Option<&dyn FixtureSupport> {
        self.inner.fixtures()
    }
}

fn replay(items: Arc<Vec<ListingItem>>) -> ListingStream {
    let count = items.len();
    stream::iter(0..count)
        .map(move |index| items[index].clone())
        .boxed()
}

/// Middleware that wraps sources in a [`ResultCache`].
///
/// Each wrapped source gets its own cache. The configuration is validated
/// here so applying the middleware cannot fail.
pub fn result_cache(config: ResultCacheConfig) -> Result<SourceMiddleware, CacheInitError> {
    let config = config.validated()?;
    Ok(Arc::new(move |inner: Arc<dyn Source>| {
        Arc::new(ResultCache::with_checked_config(inner, config)) as Arc<dyn Source>
    }))
}
