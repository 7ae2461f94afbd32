//! Behavior-driven tests for interleaved aggregation.
//!
//! These tests verify HOW several listing sources are merged into a single
//! time-ordered stream: ordering, limits, failure handling and teardown.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use marquee_core::{
    interleave, FetchError, Interleaved, ListingItem, ListingStream, NoneSource, QueryWindow,
    Showtime, Source, StaticSource, UtcDateTime,
};
use tokio_util::sync::CancellationToken;

fn item(id: &str, start: &str) -> ListingItem {
    let start = UtcDateTime::parse(start).expect("valid timestamp");
    ListingItem::new(Showtime::new(id, id, start))
}

fn static_source(descriptor: &str, items: &[(&str, &str)]) -> Arc<dyn Source> {
    Arc::new(StaticSource::new(
        descriptor,
        items.iter().map(|(id, start)| item(id, start)),
    ))
}

async fn collect_ids(source: &dyn Source, window: QueryWindow) -> Vec<String> {
    source
        .fetch(CancellationToken::new(), window)
        .await
        .expect("fetch succeeds")
        .map(|item| item.showtime.id)
        .collect()
        .await
}

/// Yields its items with a pause before each one.
struct SlowSource {
    descriptor: String,
    items: Vec<ListingItem>,
    delay: Duration,
}

impl Source for SlowSource {
    fn descriptor(&self) -> String {
        self.descriptor.clone()
    }

    fn fetch(
        &self,
        _cancel: CancellationToken,
        _window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        let items = self.items.clone();
        let delay = self.delay;
        Box::pin(async move {
            let stream = stream::iter(items)
                .then(move |item| async move {
                    tokio::time::sleep(delay).await;
                    item
                })
                .boxed();
            Ok(stream)
        })
    }
}

struct FailingSource;

impl Source for FailingSource {
    fn descriptor(&self) -> String {
        String::from("broken")
    }

    fn fetch(
        &self,
        _cancel: CancellationToken,
        _window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        Box::pin(async { Err(FetchError::upstream(503, "calendar offline")) })
    }
}

/// Produces one item, then never yields again and ignores cancellation.
struct StalledSource;

impl Source for StalledSource {
    fn descriptor(&self) -> String {
        String::from("stalled")
    }

    fn fetch(
        &self,
        _cancel: CancellationToken,
        _window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        Box::pin(async {
            let first = item("stalled-1", "2026-02-20T18:00:00Z");
            Ok(stream::iter([first]).chain(stream::pending()).boxed())
        })
    }
}

async fn wait_for_teardown(merged: &Interleaved) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while merged.running_tasks() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "merge tasks still running: {}",
            merged.running_tasks()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn when_two_venues_are_merged_showtimes_come_out_in_start_order() {
    // Given: Two venues with interleaving evening showtimes
    let merged = interleave([
        static_source("a", &[("a19", "2026-02-20T19:00:00Z"), ("a21", "2026-02-20T21:00:00Z")]),
        static_source("b", &[("b20", "2026-02-20T20:00:00Z"), ("b22", "2026-02-20T22:00:00Z")]),
    ]);

    // When: The merged listing is fetched
    let ids = collect_ids(merged.as_ref(), QueryWindow::new()).await;

    // Then: Showtimes are globally ordered by start time
    assert_eq!(ids, vec!["a19", "b20", "a21", "b22"]);
    assert_eq!(merged.descriptor(), "interleaved:a,b");
}

#[tokio::test]
async fn when_a_fast_venue_races_ahead_it_cannot_overtake_a_slow_earlier_one() {
    // Given: A slow venue holding the earliest showtime and a fast venue with later ones
    let slow: Arc<dyn Source> = Arc::new(SlowSource {
        descriptor: String::from("slow"),
        items: vec![item("slow-18", "2026-02-20T18:00:00Z"), item("slow-23", "2026-02-20T23:00:00Z")],
        delay: Duration::from_millis(50),
    });
    let fast = static_source("fast", &[("fast-19", "2026-02-20T19:00:00Z"), ("fast-20", "2026-02-20T20:00:00Z")]);
    let merged = interleave([fast, slow]);

    // When: The merged listing is fetched
    let ids = collect_ids(merged.as_ref(), QueryWindow::new()).await;

    // Then: The slow venue's early showtime still comes first
    assert_eq!(ids, vec!["slow-18", "fast-19", "fast-20", "slow-23"]);
}

#[tokio::test]
async fn when_start_times_tie_the_earlier_listed_venue_wins() {
    // Given: Two venues with a showtime at the same instant
    let merged = interleave([
        static_source("first", &[("first", "2026-02-20T19:00:00Z")]),
        static_source("second", &[("second", "2026-02-20T19:00:00Z")]),
    ]);

    // When: The merged listing is fetched
    let ids = collect_ids(merged.as_ref(), QueryWindow::new()).await;

    // Then: Registration order breaks the tie
    assert_eq!(ids, vec!["first", "second"]);
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn when_only_one_venue_is_given_it_is_used_directly() {
    // Given: A single venue plus an empty placeholder
    let venue = static_source("solo", &[("solo-1", "2026-02-20T19:00:00Z")]);

    // When: The sources are interleaved
    let merged = interleave([Arc::clone(&venue), Arc::new(NoneSource) as Arc<dyn Source>]);

    // Then: The venue itself comes back, untouched
    assert!(Arc::ptr_eq(&merged, &venue));
}

#[tokio::test]
async fn when_aggregates_are_nested_they_flatten_into_one_merge() {
    // Given: An aggregate of two venues nested inside another aggregate
    let inner = interleave([
        static_source("a", &[("a1", "2026-02-20T19:00:00Z")]),
        static_source("b", &[("b1", "2026-02-20T21:00:00Z")]),
    ]);
    let outer = interleave([inner, static_source("c", &[("c1", "2026-02-20T20:00:00Z")])]);

    // When: The outer aggregate is inspected and fetched
    let leaves = outer.leaves().expect("aggregate exposes its leaves");
    let ids = collect_ids(outer.as_ref(), QueryWindow::new()).await;

    // Then: It merges the three venues directly
    assert_eq!(leaves.len(), 3);
    assert_eq!(outer.descriptor(), "interleaved:a,b,c");
    assert_eq!(ids, vec!["a1", "c1", "b1"]);
}

// =============================================================================
// Limits and failures
// =============================================================================

#[tokio::test]
async fn when_limit_is_one_only_the_earliest_showtime_is_returned() {
    // Given: Two venues
    let merged = interleave([
        static_source("a", &[("a19", "2026-02-20T19:00:00Z"), ("a21", "2026-02-20T21:00:00Z")]),
        static_source("b", &[("b18", "2026-02-20T18:00:00Z")]),
    ]);

    // When: A single showtime is requested
    let ids = collect_ids(merged.as_ref(), QueryWindow::new().with_limit(1)).await;

    // Then: Exactly the earliest showtime is returned
    assert_eq!(ids, vec!["b18"]);
}

#[tokio::test]
async fn when_one_venue_fails_the_others_are_still_listed() {
    // Given: A healthy venue and a venue whose calendar is down
    let merged = interleave([
        Arc::new(FailingSource) as Arc<dyn Source>,
        static_source("ok", &[("ok-1", "2026-02-20T19:00:00Z"), ("ok-2", "2026-02-20T20:00:00Z")]),
    ]);

    // When: The merged listing is fetched
    let ids = collect_ids(merged.as_ref(), QueryWindow::new()).await;

    // Then: The healthy venue's showtimes are returned without error
    assert_eq!(ids, vec!["ok-1", "ok-2"]);
}

#[tokio::test]
async fn when_every_venue_is_empty_the_merge_ends_immediately() {
    // Given: Two venues with nothing scheduled
    let merged = interleave([static_source("a", &[]), static_source("b", &[])]);

    // When: The merged listing is fetched
    let ids = collect_ids(merged.as_ref(), QueryWindow::new()).await;

    // Then: The stream is empty
    assert!(ids.is_empty());
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test]
async fn when_the_consumer_drops_the_stream_all_merge_tasks_stop() {
    // Given: A merge where one venue stalls forever after its first showtime
    let merged = Interleaved::new([
        Arc::new(StalledSource) as Arc<dyn Source>,
        static_source("ok", &[("ok-1", "2026-02-20T19:00:00Z")]),
    ]);
    let mut stream = merged
        .fetch(CancellationToken::new(), QueryWindow::new())
        .await
        .expect("fetch succeeds");

    // When: The consumer reads the first showtime and walks away
    let first = stream.next().await.expect("first showtime");
    drop(stream);

    // Then: Every worker and the coordinator finish promptly
    assert_eq!(first.showtime.id, "stalled-1");
    wait_for_teardown(&merged).await;
}

#[tokio::test]
async fn when_the_caller_cancels_the_stream_ends_and_tasks_stop() {
    // Given: A merge that can never complete on its own
    let merged = Interleaved::new([
        Arc::new(StalledSource) as Arc<dyn Source>,
        static_source("ok", &[("ok-1", "2026-02-20T19:00:00Z")]),
    ]);
    let cancel = CancellationToken::new();
    let mut stream = merged
        .fetch(cancel.clone(), QueryWindow::new())
        .await
        .expect("fetch succeeds");
    stream.next().await.expect("first showtime");

    // When: The caller cancels
    cancel.cancel();

    // Then: The stream ends and no task outlives the merge
    let rest = tokio::time::timeout(Duration::from_secs(2), stream.collect::<Vec<_>>())
        .await
        .expect("stream ends after cancellation");
    assert!(rest.len() <= 1);
    wait_for_teardown(&merged).await;
}

#[tokio::test]
async fn when_the_limit_is_reached_remaining_workers_are_released() {
    // Given: A merge over a stalled venue, limited to one showtime
    let merged = Interleaved::new([
        Arc::new(StalledSource) as Arc<dyn Source>,
        static_source("ok", &[("ok-1", "2026-02-20T19:00:00Z")]),
    ]);

    // When: The limited listing is fetched to completion
    let ids = collect_ids(&merged, QueryWindow::new().with_limit(1)).await;

    // Then: The stream ends after one showtime and the stalled worker is stopped
    assert_eq!(ids, vec!["stalled-1"]);
    wait_for_teardown(&merged).await;
}
