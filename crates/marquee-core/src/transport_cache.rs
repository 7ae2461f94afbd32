//! Response caching decorator for [`HttpClient`] transports.
//!
//! Successful GET responses are kept in a bounded LRU keyed by method and
//! normalized URL. `Cache-Control` is honoured in both directions: requests
//! can ask for a fresh response, and responses can refuse storage or bound
//! their lifetime with `s-maxage` / `max-age`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse};
use crate::lru::LruMap;
use crate::CacheInitError;

pub const DEFAULT_TRANSPORT_CACHE_CAPACITY: usize = 1000;

/// Callback invoked once per request with the cache key and whether it was a hit.
pub type CacheAudit = Arc<dyn Fn(&str, bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCacheConfig {
    pub capacity: usize,
}

impl Default for TransportCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TRANSPORT_CACHE_CAPACITY,
        }
    }
}

impl TransportCacheConfig {
    pub fn new(capacity: usize) -> Result<Self, CacheInitError> {
        if capacity == 0 {
            return Err(CacheInitError::ZeroCapacity { cache: "transport" });
        }
        Ok(Self { capacity })
    }
}

#[derive(Debug, Clone)]
struct StoredResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
    // None: bounded only by LRU
    expires: Option<Instant>,
}

impl StoredResponse {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires.map_or(true, |expires| now < expires)
    }

    fn to_response(&self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

/// [`HttpClient`] decorator that serves repeated GETs from memory.
///
/// The lock is released while the origin is called, so concurrent misses for
/// the same key may both reach the origin.
pub struct CachingHttpClient<C> {
    origin: C,
    entries: Mutex<LruMap<String, StoredResponse>>,
    audit: Option<CacheAudit>,
}

impl<C: HttpClient> CachingHttpClient<C> {
    pub fn new(origin: C, config: TransportCacheConfig) -> Result<Self, CacheInitError> {
        let config = TransportCacheConfig::new(config.capacity)?;
        Ok(Self {
            origin,
            entries: Mutex::new(LruMap::new(config.capacity)),
            audit: None,
        })
    }

    pub fn with_audit(mut self, audit: CacheAudit) -> Self {
        self.audit = Some(audit);
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    fn report(&self, key: &str, hit: bool) {
        if let Some(audit) = &self.audit {
            audit(key, hit);
        }
    }

    async fn cached(&self, key: &String) -> Option<HttpResponse> {
        let mut entries = self.entries.lock().await;
        let fresh = entries
            .get(key)
            .map(|stored| (stored.is_fresh(Instant::now()), stored.to_response()));

        match fresh {
            Some((true, response)) => Some(response),
            Some((false, _)) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl<C> std::fmt::Debug for CachingHttpClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingHttpClient")
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> HttpClient for CachingHttpClient<C> {
    fn execute(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, HttpError>> {
        Box::pin(async move {
            let key = cache_key(&request);

            if request_wants_fresh(&request) {
                debug!(key = %key, "request asked for a fresh response, bypassing cache");
            } else if let Some(response) = self.cached(&key).await {
                debug!(key = %key, "transport cache hit");
                self.report(&key, true);
                return Ok(response);
            }

            let method = request.method;
            let response = self.origin.execute(request).await?;

            if method == HttpMethod::Get && response.is_success() {
                let policy = response_cache_control(&response);
                if policy.no_store {
                    debug!(key = %key, "response refused storage");
                } else {
                    let stored = StoredResponse {
                        status: response.status,
                        headers: response.headers.clone(),
                        body: response.body.clone(),
                        expires: policy.max_age.map(|ttl| Instant::now() + ttl),
                    };
                    if let Some((evicted, _)) = self.entries.lock().await.insert(key.clone(), stored) {
                        debug!(key = %evicted, "transport cache evicted least recently used entry");
                    }
                }
            }

            self.report(&key, false);
            Ok(response)
        })
    }
}

/// `METHOD url`, with the URL normalized when it parses.
fn cache_key(request: &HttpRequest) -> String {
    let url = url::Url::parse(&request.url)
        .map(String::from)
        .unwrap_or_else(|_| request.url.clone());
    format!("{} {url}", request.method)
}

fn directives(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(|part| part.trim().to_ascii_lowercase())
        .filter(|part| !part.is_empty())
}

fn directive_seconds(directive: &str, name: &str) -> Option<i64> {
    directive
        .strip_prefix(name)?
        .strip_prefix('=')?
        .trim()
        .parse()
        .ok()
}

/// True when the request's `Cache-Control` asks to skip the cache.
fn request_wants_fresh(request: &HttpRequest) -> bool {
    let Some(value) = request.header("cache-control") else {
        return false;
    };
    directives(value).any(|directive| {
        directive == "no-cache"
            || directive_seconds(&directive, "max-age").is_some_and(|seconds| seconds <= 0)
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ResponsePolicy {
    no_store: bool,
    max_age: Option<Duration>,
}

fn response_cache_control(response: &HttpResponse) -> ResponsePolicy {
    let mut policy = ResponsePolicy::default();
    let Some(value) = response.header("cache-control") else {
        return policy;
    };

    let mut max_age = None;
    let mut shared_max_age = None;
    for directive in directives(value) {
        match directive.as_str() {
            "no-store" | "no-cache" => policy.no_store = true,
            _ => {
                if let Some(seconds) = directive_seconds(&directive, "s-maxage").filter(|s| *s > 0) {
                    shared_max_age = Some(seconds);
                } else if let Some(seconds) = directive_seconds(&directive, "max-age").filter(|s| *s > 0) {
                    max_age = Some(seconds);
                }
            }
        }
    }

    policy.max_age = shared_max_age
        .or(max_age)
        .map(|seconds| Duration::from_secs(seconds.unsigned_abs()));
    policy
}
