//! # Marquee Core
//!
//! Streaming aggregation core for cinema showtime listings.
//!
//! ## Overview
//!
//! This crate provides the pieces that sit between venue-specific sources and
//! whatever consumes their listings:
//!
//! - **Source contract** producing time-ordered listing streams
//! - **Interleaved aggregation** merging many sources into one ordered stream
//! - **Result caching** of complete fetches as source middleware
//! - **Transport caching** of upstream HTTP responses
//! - **Registry** resolving site identifiers to middleware-wrapped sources
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregate`] | K-way merge over sources |
//! | [`config`] | Cache sizing with environment overrides |
//! | [`domain`] | Showtimes, listing items, query windows, timestamps |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`registry`] | Site identifier to source resolution |
//! | [`result_cache`] | Whole-result source caching |
//! | [`source`] | Source trait and built-in sources |
//! | [`transport_cache`] | HTTP response caching |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use marquee_core::{result_cache, CacheSettings, QueryWindow, SourceRegistry, UtcDateTime};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = CacheSettings::from_env();
//!     let cached = result_cache(settings.result_cache()?)?;
//!
//!     let registry = SourceRegistry::builder()
//!         .with_source("hollywood-theatre", hollywood, [cached.clone()])
//!         .with_source("cinema21", cinema21, [cached])
//!         .build();
//!
//!     let window = QueryWindow::upcoming(UtcDateTime::now()).with_limit(20);
//!     let mut listings = registry
//!         .lookup_all()
//!         .fetch(CancellationToken::new(), window)
//!         .await?;
//!
//!     while let Some(item) = listings.next().await {
//!         println!("{} {}", item.showtime.start_time, item.showtime.summary);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Caller          │
//! └────────┬────────┘
//!          │ lookup / lookup_all
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ SourceRegistry  │────▶│ Interleaved      │
//! └────────┬────────┘     │ (k-way merge)    │
//!          │              └────────┬─────────┘
//!          ▼                       ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ ResultCache     │────▶│ Venue Source     │
//! │ (middleware)    │     └────────┬─────────┘
//! └─────────────────┘              ▼
//!                         ┌──────────────────┐
//!                         │ CachingHttpClient│
//!                         │ ▶ reqwest        │
//!                         └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use marquee_core::{FetchError, FetchErrorKind};
//!
//! fn describe(error: &FetchError) -> &'static str {
//!     match error.kind() {
//!         FetchErrorKind::Unavailable => "venue unreachable",
//!         FetchErrorKind::Upstream => "venue returned an error",
//!         FetchErrorKind::Parse => "venue page changed shape",
//!         FetchErrorKind::Cancelled => "cancelled",
//!         FetchErrorKind::Internal => "bug",
//!     }
//! }
//! ```
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
mod lru;
pub mod registry;
pub mod result_cache;
pub mod source;
pub mod transport_cache;

// Aggregation
pub use aggregate::{interleave, Interleaved};

// Configuration
pub use config::CacheSettings;

// Domain models
pub use domain::{Link, ListingItem, QueryWindow, ScreeningInfo, Showtime, UtcDateTime, DEFAULT_LIMIT};

// Error types
pub use error::{CacheInitError, FetchError, FetchErrorKind, NotFoundError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient};

// Registry
pub use registry::{RegistryBuilder, SourceRegistry};

// Caching
pub use result_cache::{result_cache, CacheStats, ResultCache, ResultCacheConfig};
pub use transport_cache::{CacheAudit, CachingHttpClient, TransportCacheConfig};

// Sources
pub use source::{
    FixtureSupport, ListingStream, NoneSource, Source, SourceMiddleware, StaticSource,
    NONE_DESCRIPTOR,
};
