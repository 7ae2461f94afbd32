use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::result_cache::ResultCacheConfig;
use crate::transport_cache::{TransportCacheConfig, DEFAULT_TRANSPORT_CACHE_CAPACITY};
use crate::CacheInitError;

pub const RESULT_CACHE_CAPACITY_ENV: &str = "MARQUEE_RESULT_CACHE_CAPACITY";
pub const RESULT_CACHE_TTL_ENV: &str = "MARQUEE_RESULT_CACHE_TTL_SECS";
pub const HTTP_CACHE_CAPACITY_ENV: &str = "MARQUEE_HTTP_CACHE_CAPACITY";

/// Cache sizing shared by the result and transport caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub result_capacity: usize,
    pub result_ttl: Duration,
    pub http_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let result = ResultCacheConfig::default();
        Self {
            result_capacity: result.capacity,
            result_ttl: result.ttl,
            http_capacity: DEFAULT_TRANSPORT_CACHE_CAPACITY,
        }
    }
}

impl CacheSettings {
    /// Defaults overridden by `MARQUEE_*` environment variables.
    ///
    /// Unset variables keep their default; unparseable or zero capacities are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            result_capacity: capacity_override(&lookup, RESULT_CACHE_CAPACITY_ENV)
                .unwrap_or(defaults.result_capacity),
            result_ttl: parse_override::<u64>(&lookup, RESULT_CACHE_TTL_ENV)
                .map(Duration::from_secs)
                .unwrap_or(defaults.result_ttl),
            http_capacity: capacity_override(&lookup, HTTP_CACHE_CAPACITY_ENV)
                .unwrap_or(defaults.http_capacity),
        }
    }

    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    pub fn with_result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn with_http_capacity(mut self, capacity: usize) -> Self {
        self.http_capacity = capacity;
        self
    }

    pub fn result_cache(&self) -> Result<ResultCacheConfig, CacheInitError> {
        ResultCacheConfig::new(self.result_capacity, self.result_ttl)
    }

    pub fn transport_cache(&self) -> Result<TransportCacheConfig, CacheInitError> {
        TransportCacheConfig::new(self.http_capacity)
    }
}

fn parse_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable cache setting");
            None
        }
    }
}

fn capacity_override(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<usize> {
    let capacity = parse_override::<usize>(lookup, name)?;
    if capacity == 0 {
        warn!(variable = name, "ignoring zero cache capacity");
        return None;
    }
    Some(capacity)
}
