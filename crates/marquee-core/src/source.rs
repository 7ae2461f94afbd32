//! Source contract and the built-in sources.
//!
//! A [`Source`] turns a [`QueryWindow`] into a stream of [`ListingItem`]s in
//! non-decreasing [`ListingItem::ordering_key`] order. The aggregator and the
//! result cache are sources themselves, so they compose freely.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use marquee_core::{FetchError, ListingStream, QueryWindow, Source};
//! use futures::future::BoxFuture;
//! use tokio_util::sync::CancellationToken;
//!
//! struct HollywoodTheatre { /* http client, base url... */ }
//!
//! impl Source for HollywoodTheatre {
//!     fn descriptor(&self) -> String {
//!         String::from("hollywood-theatre")
//!     }
//!
//!     fn fetch(
//!         &self,
//!         cancel: CancellationToken,
//!         window: QueryWindow,
//!     ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
//!         // fetch the calendar page, parse it, yield items in start-time order
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{FetchError, ListingItem, QueryWindow};

/// Stream of listing items produced by a single fetch.
pub type ListingStream = BoxStream<'static, ListingItem>;

/// Listing source contract.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the aggregator drives every leaf
/// from its own task.
pub trait Source: Send + Sync {
    /// Stable identity used for registry lookups and cache keys.
    fn descriptor(&self) -> String;

    /// Starts a fetch for `window`.
    ///
    /// The returned stream must end promptly once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the provider cannot be reached or its
    /// response cannot be interpreted.
    fn fetch(
        &self,
        cancel: CancellationToken,
        window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>>;

    /// Leaf sources of a composite; `None` for leaves.
    fn leaves(&self) -> Option<Vec<Arc<dyn Source>>> {
        None
    }

    /// Fixture capability, if this source can capture its upstream responses.
    fn fixtures(&self) -> Option<&dyn FixtureSupport> {
        None
    }
}

/// Capability of sources that can record their upstream responses to disk
/// for offline replay.
pub trait FixtureSupport: Send + Sync {
    /// Names of the fixture files this source writes, without extension.
    fn fixture_names(&self) -> Vec<String>;

    /// Fetches every upstream document this source depends on and writes it under `dir`.
    fn pull_fixtures<'a>(
        &'a self,
        cancel: CancellationToken,
        dir: &'a Path,
    ) -> BoxFuture<'a, Result<(), FetchError>>;
}

/// Wraps a source with extra behaviour, such as result caching.
pub type SourceMiddleware = Arc<dyn Fn(Arc<dyn Source>) -> Arc<dyn Source> + Send + Sync>;

/// Reserved descriptor of [`NoneSource`].
pub const NONE_DESCRIPTOR: &str = "none";

/// Source that never yields anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneSource;

impl Source for NoneSource {
    fn descriptor(&self) -> String {
        String::from(NONE_DESCRIPTOR)
    }

    fn fetch(
        &self,
        _cancel: CancellationToken,
        window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        debug!(descriptor = NONE_DESCRIPTOR, window = %window.cache_key(), "fetch");
        Box::pin(async { Ok(stream::empty().boxed()) })
    }
}

/// Source over a preloaded list of items.
///
/// Items are sorted by ordering key at construction; each fetch yields the
/// ones inside the window, capped at the window limit.
#[derive(Debug, Clone)]
pub struct StaticSource {
    descriptor: String,
    items: Arc<Vec<ListingItem>>,
}

impl StaticSource {
    pub fn new(descriptor: impl Into<String>, items: impl IntoIterator<Item = ListingItem>) -> Self {
        let mut items: Vec<ListingItem> = items.into_iter().collect();
        // stable, so equal keys keep their given order
        items.sort_by_key(ListingItem::ordering_key);
        Self {
            descriptor: descriptor.into(),
            items: Arc::new(items),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Source for StaticSource {
    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    fn fetch(
        &self,
        cancel: CancellationToken,
        window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        let items = Arc::clone(&self.items);
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(FetchError::cancelled());
            }

            let cap = window.max_items().unwrap_or(usize::MAX);
            let selected: Vec<ListingItem> = items
                .iter()
                .filter(|item| window.contains(item.ordering_key()))
                .take(cap)
                .cloned()
                .collect();

            let stream = stream::iter(selected)
                .take_until(cancel.cancelled_owned())
                .boxed();
            Ok(stream)
        })
    }
}
