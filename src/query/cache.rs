//! The query cache and its read-through fetch machinery.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, Shared};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::subscription::{Handle, listen};

use super::config::QueryConfig;
use super::entry::{CacheEntry, Snapshot};
use super::fingerprint::Fingerprint;

/// A committed state transition of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    FetchStarted,
    FetchSucceeded,
    FetchFailed,
    Seeded,
    Updated,
    Invalidated,
    Removed,
}

/// Notification sent to cache listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEvent {
    pub fingerprint: Fingerprint,
    pub kind: CacheEventKind,
}

/// The one running fetch for a fingerprint. Every caller awaiting it shares the
/// same underlying request.
type InFlight = Shared<BoxFuture<'static, ()>>;

struct Slot {
    snapshot: Arc<Snapshot>,
    in_flight: Option<InFlight>,
    // Set when the entry is invalidated or removed while a fetch is running,
    // so the result of that fetch lands already stale.
    invalidated_in_flight: bool,
    touched_at: Instant,
}

impl Slot {
    fn new() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::empty()),
            in_flight: None,
            invalidated_in_flight: false,
            touched_at: Instant::now(),
        }
    }

    fn replace(&mut self, snapshot: Snapshot) {
        self.snapshot = Arc::new(snapshot);
    }
}

/// Keyed cache of response data, loading state and error state.
///
/// The `QueryCache` is the central state manager for reads. It handles:
/// - Read-through fetching with per-fingerprint coalescing
/// - Seeding, functional updates, invalidation and removal
/// - Broadcasting one [`CacheEvent`] per committed transition
///
/// Cloning is cheap; clones share the same entries.
///
/// Values of any `Clone + Send + Sync` type can be stored; reading an entry as
/// a different type than it was stored with yields no data.
///
/// # Example
///
/// ```rust
/// use postboard::query::{Fingerprint, QueryCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = QueryCache::new();
/// let entry = cache
///     .fetch(&Fingerprint::Post(1), || Box::pin(async { Ok("hello".to_string()) }))
///     .await;
/// assert_eq!(entry.data.as_deref(), Some("hello"));
/// # }
/// ```
#[derive(Clone)]
pub struct QueryCache {
    slots: Arc<DashMap<Fingerprint, Slot>>,
    events: broadcast::Sender<CacheEvent>,
    config: QueryConfig,
}

impl QueryCache {
    /// Creates a new query cache with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query cache with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            slots: Arc::new(DashMap::new()),
            events,
            config,
        }
    }

    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the current entry, starting a fetch when needed.
    ///
    /// A fetch is started via `fetcher` when there is no entry for
    /// `fingerprint`, or when the entry is stale and nothing is in flight for
    /// it. Otherwise `fetcher` is dropped without being called. The fetch runs
    /// on its own task; its outcome is stored when it completes, whether or
    /// not anyone still cares about it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn read<V, F>(&self, fingerprint: &Fingerprint, fetcher: F) -> CacheEntry<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>> + Send + 'static,
    {
        self.read_snapshot(*fingerprint, fetcher).view()
    }

    /// Like [`read`](Self::read), then waits for the in-flight fetch (if any)
    /// and returns the settled entry.
    pub async fn fetch<V, F>(&self, fingerprint: &Fingerprint, fetcher: F) -> CacheEntry<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>> + Send + 'static,
    {
        self.read_snapshot(*fingerprint, fetcher);
        let pending = self
            .slots
            .get(fingerprint)
            .and_then(|slot| slot.in_flight.clone());
        if let Some(pending) = pending {
            pending.await;
        }
        self.peek(fingerprint)
            .unwrap_or_else(|| Snapshot::empty().view())
    }

    /// Returns the current entry without ever fetching.
    pub fn peek<V: Clone + 'static>(&self, fingerprint: &Fingerprint) -> Option<CacheEntry<V>> {
        self.slots.get(fingerprint).map(|slot| slot.snapshot.view())
    }

    /// Overwrites the entry's data without a network call, clearing its error
    /// and staleness.
    pub fn seed<V: Send + Sync + 'static>(&self, fingerprint: &Fingerprint, data: V) {
        {
            let mut slot = self.slots.entry(*fingerprint).or_insert_with(Slot::new);
            let mut snapshot = Snapshot::with_data(Arc::new(data));
            snapshot.is_fetching = slot.in_flight.is_some();
            slot.replace(snapshot);
            slot.invalidated_in_flight = false;
            slot.touched_at = Instant::now();
        }
        self.commit(*fingerprint, CacheEventKind::Seeded);
    }

    /// Replaces the entry's data with `transform(current)`.
    ///
    /// Returns `false`, leaving the cache alone, when the entry holds no data of
    /// type `V`. `transform` runs while the entry is locked and must not touch
    /// the cache.
    pub fn update<V, F>(&self, fingerprint: &Fingerprint, transform: F) -> bool
    where
        V: Send + Sync + 'static,
        F: FnOnce(&V) -> V,
    {
        {
            let Some(mut slot) = self.slots.get_mut(fingerprint) else {
                return false;
            };
            let Some(current) = slot.snapshot.typed::<V>() else {
                return false;
            };
            let next = transform(current);
            let mut snapshot = (*slot.snapshot).clone();
            snapshot.data = Some(Arc::new(next));
            snapshot.updated_at = Some(Instant::now());
            slot.replace(snapshot);
            slot.touched_at = Instant::now();
        }
        self.commit(*fingerprint, CacheEventKind::Updated);
        true
    }

    /// Marks the entry stale so that the next read refetches. Does not fetch.
    ///
    /// Returns `false` if there is no entry.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        {
            let Some(mut slot) = self.slots.get_mut(fingerprint) else {
                return false;
            };
            if slot.in_flight.is_some() {
                slot.invalidated_in_flight = true;
            }
            let mut snapshot = (*slot.snapshot).clone();
            snapshot.is_stale = true;
            slot.replace(snapshot);
        }
        self.commit(*fingerprint, CacheEventKind::Invalidated);
        true
    }

    /// Drops the entry; the next read behaves as on a cold cache.
    ///
    /// An entry with a fetch in flight is emptied instead, so that fetch stays
    /// the only one for the fingerprint; its result lands stale.
    pub fn remove(&self, fingerprint: &Fingerprint) -> bool {
        let removed = match self.slots.entry(*fingerprint) {
            Entry::Vacant(_) => false,
            Entry::Occupied(mut occupied) => {
                if occupied.get().in_flight.is_some() {
                    let slot = occupied.get_mut();
                    let mut snapshot = Snapshot::empty();
                    snapshot.is_fetching = true;
                    slot.replace(snapshot);
                    slot.invalidated_in_flight = true;
                } else {
                    occupied.remove();
                }
                true
            }
        };
        if removed {
            self.commit(*fingerprint, CacheEventKind::Removed);
        }
        removed
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let fingerprints: Vec<Fingerprint> = self.slots.iter().map(|slot| *slot.key()).collect();
        for fingerprint in &fingerprints {
            self.remove(fingerprint);
        }
    }

    /// Drops entries that have been idle for longer than `cache_time` and
    /// returns how many were dropped.
    pub fn collect_garbage(&self) -> usize {
        let cache_time = self.config.cache_time;
        let is_idle = |slot: &Slot| slot.in_flight.is_none() && slot.touched_at.elapsed() > cache_time;

        let expired: Vec<Fingerprint> = self
            .slots
            .iter()
            .filter(|slot| is_idle(slot.value()))
            .map(|slot| *slot.key())
            .collect();

        let mut dropped = 0;
        for fingerprint in expired {
            if self.slots.remove_if(&fingerprint, |_, slot| is_idle(slot)).is_some() {
                dropped += 1;
                self.commit(fingerprint, CacheEventKind::Removed);
            }
        }
        if dropped > 0 {
            debug!(dropped, "Collected idle cache entries");
        }
        dropped
    }

    /// Calls `listener` for every committed transition until the handle is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Handle
    where
        F: Fn(CacheEvent) + Send + 'static,
    {
        listen(self.events.subscribe(), listener)
    }

    /// A receiver for every committed transition from now on.
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// A stream of the entry for `fingerprint`, yielding its current state and
    /// then a new state after every transition.
    ///
    /// Each yielded state is taken through [`read`](Self::read), so an
    /// invalidated entry is refetched as soon as the invalidation is seen.
    pub fn watch<V, F>(&self, fingerprint: Fingerprint, fetcher: F) -> BoxStream<'static, CacheEntry<V>>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn() -> BoxFuture<'static, Result<V>> + Send + Sync + 'static,
    {
        let cache = self.clone();
        let fetcher = Arc::new(fetcher);
        // Subscribe before the first read so no transition slips through.
        let rx = self.events.subscribe();

        stream::unfold((rx, None), move |(mut rx, last): (_, Option<Arc<Snapshot>>)| {
            let cache = cache.clone();
            let fetcher = fetcher.clone();

            async move {
                let read = |cache: &Self| {
                    let fetcher = fetcher.clone();
                    cache.read_snapshot(fingerprint, move || fetcher())
                };

                let Some(last) = last else {
                    let snapshot = read(&cache);
                    return Some((snapshot.view(), (rx, Some(snapshot))));
                };

                loop {
                    match rx.recv().await {
                        Ok(event) if event.fingerprint == fingerprint => {}
                        Ok(_) => continue,
                        Err(RecvError::Lagged(missed)) => {
                            warn!(%fingerprint, missed, "Watcher lagged behind");
                        }
                        Err(RecvError::Closed) => return None,
                    }

                    let snapshot = read(&cache);
                    if !Arc::ptr_eq(&snapshot, &last) {
                        return Some((snapshot.view(), (rx, Some(snapshot))));
                    }
                }
            }
        })
        .boxed()
    }

    fn read_snapshot<V, F>(&self, fingerprint: Fingerprint, fetcher: F) -> Arc<Snapshot>
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>> + Send + 'static,
    {
        let (snapshot, task) = {
            let mut created = false;
            let mut slot = match self.slots.entry(fingerprint) {
                Entry::Occupied(occupied) => occupied.into_ref(),
                Entry::Vacant(vacant) => {
                    created = true;
                    vacant.insert(Slot::new())
                }
            };
            slot.touched_at = Instant::now();

            let should_fetch = slot.in_flight.is_none()
                && (created || slot.snapshot.needs_fetch(self.config.stale_time));
            let task = should_fetch.then(|| {
                let task = self.fetch_task(fingerprint, fetcher);
                slot.in_flight = Some(task.clone());
                slot.invalidated_in_flight = false;
                let mut snapshot = (*slot.snapshot).clone();
                snapshot.is_fetching = true;
                slot.replace(snapshot);
                task
            });
            (slot.snapshot.clone(), task)
        };

        if let Some(task) = task {
            self.commit(fingerprint, CacheEventKind::FetchStarted);
            tokio::spawn(task);
        }
        snapshot
    }

    fn fetch_task<V, F>(&self, fingerprint: Fingerprint, fetcher: F) -> InFlight
    where
        V: Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>> + Send + 'static,
    {
        let cache = self.clone();
        async move {
            let outcome = AssertUnwindSafe(async move { fetcher().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(Error::FetchPanicked(panic_message(&*payload))));
            cache.settle(fingerprint, outcome);
        }
        .boxed()
        .shared()
    }

    /// Stores the outcome of the in-flight fetch and clears the in-flight mark.
    fn settle<V: Send + Sync + 'static>(&self, fingerprint: Fingerprint, outcome: Result<V>) {
        let kind = {
            let mut slot = self.slots.entry(fingerprint).or_insert_with(Slot::new);
            slot.in_flight = None;
            let is_stale = std::mem::take(&mut slot.invalidated_in_flight);

            let (snapshot, kind) = match outcome {
                Ok(data) => {
                    let mut snapshot = Snapshot::with_data(Arc::new(data));
                    snapshot.is_stale = is_stale;
                    (snapshot, CacheEventKind::FetchSucceeded)
                }
                Err(error) => {
                    warn!(%fingerprint, %error, "Fetch failed");
                    let mut snapshot = (*slot.snapshot).clone();
                    snapshot.error = Some(error);
                    snapshot.is_fetching = false;
                    snapshot.is_stale = is_stale;
                    (snapshot, CacheEventKind::FetchFailed)
                }
            };
            slot.replace(snapshot);
            kind
        };
        self.commit(fingerprint, kind);
    }

    fn commit(&self, fingerprint: Fingerprint, kind: CacheEventKind) {
        debug!(%fingerprint, ?kind, "Cache transition");
        // No listeners is fine.
        let _ = self.events.send(CacheEvent { fingerprint, kind });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.slots.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
