//! Streaming k-way merge over several sources.
//!
//! Each leaf source runs in its own task and forwards items into a shared
//! merge channel. A single coordinator task owns all merge state and emits an
//! item only once every still-open source has either buffered its next item
//! or finished, so an early item from a slow source can never be overtaken.
//!
//! ```text
//!  leaf 0 ──worker──┐
//!  leaf 1 ──worker──┼──▶ merge channel ──▶ coordinator ──▶ output stream
//!  leaf n ──worker──┘                      (heads + heap)
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::source::{ListingStream, NoneSource, Source, NONE_DESCRIPTOR};
use crate::{FetchError, ListingItem, QueryWindow, UtcDateTime};

const DESCRIPTOR_PREFIX: &str = "interleaved:";
const MERGE_BUFFER_PER_SOURCE: usize = 8;
const OUTPUT_BUFFER: usize = 16;

/// Combines `sources` into one time-ordered source.
///
/// Nested aggregates are flattened and empty [`NoneSource`]s dropped. No
/// remaining source yields a [`NoneSource`]; exactly one is returned as is.
pub fn interleave<I>(sources: I) -> Arc<dyn Source>
where
    I: IntoIterator<Item = Arc<dyn Source>>,
{
    let mut flat = flatten(sources);
    match flat.len() {
        0 => Arc::new(NoneSource),
        1 => flat.remove(0),
        _ => Arc::new(Interleaved {
            sources: flat,
            tracker: TaskTracker::new(),
        }),
    }
}

fn flatten<I>(sources: I) -> Vec<Arc<dyn Source>>
where
    I: IntoIterator<Item = Arc<dyn Source>>,
{
    let mut flat = Vec::new();
    for source in sources {
        match source.leaves() {
            Some(leaves) => flat.extend(leaves),
            None if source.descriptor() == NONE_DESCRIPTOR => {}
            None => flat.push(source),
        }
    }
    flat
}

/// Source that merges its leaves by [`ListingItem::ordering_key`].
///
/// Failing leaves are logged and treated as exhausted; the merge carries on
/// with whatever the others produce.
pub struct Interleaved {
    sources: Vec<Arc<dyn Source>>,
    tracker: TaskTracker,
}

impl Interleaved {
    /// Always builds an aggregate, even over zero or one leaf. Prefer [`interleave`].
    pub fn new<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Source>>,
    {
        Self {
            sources: flatten(sources),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of worker and coordinator tasks still alive across all fetches.
    pub fn running_tasks(&self) -> usize {
        self.tracker.len()
    }
}

impl std::fmt::Debug for Interleaved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interleaved")
            .field("descriptor", &self.descriptor())
            .field("running_tasks", &self.running_tasks())
            .finish()
    }
}

impl Source for Interleaved {
    fn descriptor(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(|s| s.descriptor()).collect();
        format!("{DESCRIPTOR_PREFIX}{}", parts.join(","))
    }

    fn fetch(
        &self,
        cancel: CancellationToken,
        window: QueryWindow,
    ) -> BoxFuture<'_, Result<ListingStream, FetchError>> {
        Box::pin(async move {
            let merge_cancel = cancel.child_token();
            let count = self.sources.len();
            let (merge_tx, merge_rx) = mpsc::channel(count.max(1) * MERGE_BUFFER_PER_SOURCE);
            let (out_tx, out_rx) = mpsc::channel(OUTPUT_BUFFER);

            debug!(sources = count, window = %window.cache_key(), "interleaved fetch started");

            let mut descriptors = Vec::with_capacity(count);
            for (index, source) in self.sources.iter().enumerate() {
                descriptors.push(source.descriptor());
                self.tracker.spawn(run_worker(
                    index,
                    Arc::clone(source),
                    merge_cancel.clone(),
                    window.clone(),
                    merge_tx.clone(),
                ));
            }
            // Workers hold the only senders, so `recv` yields `None` once all are gone.
            drop(merge_tx);

            let coordinator = Coordinator {
                state: MergeState::new(descriptors),
                limit: window.max_items(),
                cancel: merge_cancel.clone(),
            };
            self.tracker.spawn(coordinator.run(merge_rx, out_tx));

            let stream = MergeStream {
                items: ReceiverStream::new(out_rx),
                _cancel_on_drop: merge_cancel.drop_guard(),
            };
            Ok(stream.boxed())
        })
    }

    fn leaves(&self) -> Option<Vec<Arc<dyn Source>>> {
        Some(self.sources.clone())
    }
}

/// Output side of a merge. Dropping it tears the merge down.
struct MergeStream {
    items: ReceiverStream<ListingItem>,
    _cancel_on_drop: DropGuard,
}

impl Stream for MergeStream {
    type Item = ListingItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().items).poll_next(cx)
    }
}

#[derive(Debug)]
enum MergeInput {
    Item { index: usize, item: ListingItem },
    Exhausted { index: usize },
}

async fn run_worker(
    index: usize,
    source: Arc<dyn Source>,
    cancel: CancellationToken,
    window: QueryWindow,
    merge_tx: mpsc::Sender<MergeInput>,
) {
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        fetched = source.fetch(cancel.clone(), window) => fetched,
    };

    match fetched {
        Ok(mut stream) => loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                next = stream.next() => next,
            };
            let Some(item) = next else {
                break;
            };
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                sent = merge_tx.send(MergeInput::Item { index, item }) => sent,
            };
            if sent.is_err() {
                return;
            }
        },
        Err(error) => {
            warn!(
                source = %source.descriptor(),
                code = error.code(),
                error = %error,
                "interleaved: source failed, treating as exhausted"
            );
        }
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = merge_tx.send(MergeInput::Exhausted { index }) => {}
    }
}

struct Coordinator {
    state: MergeState,
    limit: Option<usize>,
    cancel: CancellationToken,
}

impl Coordinator {
    async fn run(
        mut self,
        mut merge_rx: mpsc::Receiver<MergeInput>,
        out_tx: mpsc::Sender<ListingItem>,
    ) {
        let mut emitted = 0usize;

        loop {
            if self.limit.is_some_and(|limit| emitted >= limit) {
                break;
            }

            if self.state.ready() {
                let Some(item) = self.state.pop() else {
                    // ready with an empty heap: every source is closed
                    break;
                };
                let sent = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return,
                    sent = out_tx.send(item) => sent,
                };
                if sent.is_err() {
                    // consumer went away
                    break;
                }
                emitted += 1;
                continue;
            }

            let input = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                input = merge_rx.recv() => input,
            };
            match input {
                Some(MergeInput::Item { index, item }) => self.state.accept(index, item),
                Some(MergeInput::Exhausted { index }) => self.state.close(index),
                None => self.state.close_all(),
            }
        }

        debug!(emitted, "interleaved fetch finished");
        // Stops workers still producing past the limit.
        self.cancel.cancel();
    }
}

/// Merge bookkeeping, owned by the coordinator.
///
/// `heads` is the arena: the earliest unsent item per source. The heap holds
/// `(key, index)` pairs pointing into it, so payloads never move while the
/// heap reorders. Invariant: `heads[i]` is `None` only when `pending[i]` is empty.
struct MergeState {
    descriptors: Vec<String>,
    heads: Vec<Option<ListingItem>>,
    pending: Vec<VecDeque<ListingItem>>,
    closed: Vec<bool>,
    last_key: Vec<Option<UtcDateTime>>,
    heap: BinaryHeap<Reverse<(UtcDateTime, usize)>>,
}

impl MergeState {
    fn new(descriptors: Vec<String>) -> Self {
        let count = descriptors.len();
        Self {
            descriptors,
            heads: (0..count).map(|_| None).collect(),
            pending: (0..count).map(|_| VecDeque::new()).collect(),
            closed: vec![false; count],
            last_key: vec![None; count],
            heap: BinaryHeap::with_capacity(count),
        }
    }

    fn accept(&mut self, index: usize, item: ListingItem) {
        let key = item.ordering_key();
        if let Some(last) = self.last_key[index] {
            if key < last {
                warn!(
                    source = %self.descriptors[index],
                    previous = %last,
                    current = %key,
                    "interleaved: source emitted out of order; merge order not guaranteed"
                );
            }
        }
        self.last_key[index] = Some(key);

        if self.heads[index].is_none() {
            self.heads[index] = Some(item);
            self.heap.push(Reverse((key, index)));
        } else {
            self.pending[index].push_back(item);
        }
    }

    fn close(&mut self, index: usize) {
        self.closed[index] = true;
    }

    fn close_all(&mut self) {
        self.closed.iter_mut().for_each(|closed| *closed = true);
    }

    /// True when no open source could still deliver something earlier than the heap top.
    fn ready(&self) -> bool {
        self.closed
            .iter()
            .zip(&self.heads)
            .all(|(closed, head)| *closed || head.is_some())
    }

    fn pop(&mut self) -> Option<ListingItem> {
        let Reverse((_, index)) = self.heap.pop()?;
        let item = self.heads[index].take();
        if let Some(next) = self.pending[index].pop_front() {
            self.heap.push(Reverse((next.ordering_key(), index)));
            self.heads[index] = Some(next);
        }
        item
    }
}
