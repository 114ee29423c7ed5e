//! Keyed cache of fetched resources.
//!
//! Each entry owns its fetch function, its subscribers' policies and the
//! timers (poll, eviction) scheduled on its behalf. The entry map sits behind
//! one mutex that is never held across an `.await`; all async work happens in
//! spawned tasks that report back through [`QueryCache::complete`].

use super::Query;
use super::error::QueryError;
use super::handle::QueryHandle;
use super::key::QueryKey;
use super::policy::QueryPolicy;
use super::retry::with_retry;
use crate::api::ApiError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, ApiError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Untyped state shared with every subscriber of one entry.
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub status: QueryStatus,
    pub data: Option<AnyValue>,
    pub error: Option<QueryError>,
    pub updated_at: Option<Instant>,
    pub is_fetching: bool,
    pub is_invalidated: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            is_fetching: false,
            is_invalidated: false,
        }
    }
}

struct Scheduled {
    id: u64,
    handle: AbortHandle,
}

struct Entry {
    snapshot: watch::Sender<Snapshot>,
    observers: HashMap<u64, QueryPolicy>,
    fetch_fn: Option<FetchFn>,
    retry: u32,
    retry_delay: Duration,
    gc_time: Duration,
    in_flight: Option<u64>,
    refetch_queued: bool,
    poll: Option<Scheduled>,
    poll_every: Option<Duration>,
    gc: Option<Scheduled>,
}

impl Entry {
    fn new() -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            snapshot,
            observers: HashMap::new(),
            fetch_fn: None,
            retry: 0,
            retry_delay: Duration::ZERO,
            gc_time: Duration::ZERO,
            in_flight: None,
            refetch_queued: false,
            poll: None,
            poll_every: None,
            gc: None,
        }
    }

    fn has_active_observers(&self) -> bool {
        self.observers.values().any(|p| p.enabled)
    }

    /// Smallest poll interval among enabled subscribers.
    fn poll_interval(&self) -> Option<Duration> {
        self.observers
            .values()
            .filter(|p| p.enabled)
            .filter_map(|p| p.refetch_interval)
            .min()
    }

    fn needs_fetch(&self, stale_time: Duration, now: Instant) -> bool {
        let snapshot = self.snapshot.borrow();
        match snapshot.status {
            QueryStatus::Idle | QueryStatus::Error => true,
            QueryStatus::Loading => self.in_flight.is_none(),
            QueryStatus::Success => {
                snapshot.is_invalidated
                    || snapshot
                        .updated_at
                        .is_none_or(|at| now.saturating_duration_since(at) >= stale_time)
            }
        }
    }

    fn cancel_poll(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.handle.abort();
        }
        self.poll_every = None;
    }
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.cancel_poll();
        if let Some(gc) = self.gc.take() {
            gc.handle.abort();
        }
    }
}

pub(crate) struct Shared {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    next_id: AtomicU64,
    defaults: QueryPolicy,
}

/// Spawns a timer task if a runtime is available.
fn spawn_timer<F>(fut: F) -> Option<AbortHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::runtime::Handle::try_current()
        .ok()
        .map(|rt| rt.spawn(fut).abort_handle())
}

/// Handle to the cache. Clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryPolicy::default())
    }
}

impl QueryCache {
    /// `defaults` is what [`QueryCache::policy`] hands out for views to refine.
    pub fn new(defaults: QueryPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                defaults,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn policy(&self) -> QueryPolicy {
        self.shared.defaults.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers interest in `key`.
    ///
    /// A missing, failed or stale entry is fetched (keeping any previous value
    /// visible); a fresh entry is served as is; a loading entry is joined.
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetch: F, policy: QueryPolicy) -> QueryHandle<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetch_fn: FetchFn = Arc::new(move || {
            let fut = fetch();
            async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        });
        let observer_id = self.next_id();
        let enabled = policy.enabled;

        let receiver = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(|| {
                debug!(%key, "Cache MISS");
                Entry::new()
            });
            if let Some(gc) = entry.gc.take() {
                debug!(%key, "Eviction cancelled");
                gc.handle.abort();
            }
            entry.fetch_fn = Some(fetch_fn);
            entry.retry = policy.retry;
            entry.retry_delay = policy.retry_delay;
            entry.gc_time = entry.gc_time.max(policy.gc_time);
            let stale_time = policy.stale_time;
            entry.observers.insert(observer_id, policy);

            let receiver = entry.snapshot.subscribe();
            if enabled {
                self.activate(&key, entry, stale_time);
            }
            receiver
        };

        QueryHandle::new(
            Arc::downgrade(&self.shared),
            key,
            observer_id,
            enabled,
            receiver,
        )
    }

    /// Subscribes using a descriptor's key and fetch.
    pub fn subscribe_query<Q: Query>(&self, query: Q, policy: QueryPolicy) -> QueryHandle<Q::Output> {
        let key = query.key();
        let query = Arc::new(query);
        self.subscribe(
            key,
            move || {
                let query = Arc::clone(&query);
                async move { query.fetch().await }
            },
            policy,
        )
    }

    /// Marks every entry under `prefix` stale. Entries with an enabled
    /// subscriber refetch now, or right after the fetch already in flight.
    /// Returns the number of entries matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut matched = 0;
        for (key, entry) in entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            matched += 1;
            entry.snapshot.send_modify(|s| s.is_invalidated = true);
            if entry.in_flight.is_some() {
                entry.refetch_queued = true;
            } else if entry.has_active_observers() {
                self.start_fetch(key, entry);
            }
        }
        info!(%prefix, matched, "Invalidated queries");
        matched
    }

    /// Last successful value for `key`, if any and of type `T`.
    pub fn get_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let entries = self.lock();
        let data = entries.get(key)?.snapshot.borrow().data.clone()?;
        data.downcast::<T>().ok()
    }

    /// Drops every entry under `prefix`. Live handles keep their last
    /// snapshot but receive no further updates.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        debug!(%prefix, removed, "Removed queries");
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
        debug!("Cache CLEAR");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.lock().get(key).map_or(0, |e| e.observers.len())
    }

    pub(crate) fn unsubscribe(&self, key: &QueryKey, observer_id: u64) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.observers.remove(&observer_id).is_none() {
            return;
        }
        if entry.observers.is_empty() {
            entry.cancel_poll();
            if !self.schedule_gc(key, entry) {
                entries.remove(key);
            }
        } else {
            self.sync_poll(key, entry, false);
        }
    }

    pub(crate) fn set_enabled(&self, key: &QueryKey, observer_id: u64, enabled: bool) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        let Some(policy) = entry.observers.get_mut(&observer_id) else {
            return;
        };
        if policy.enabled == enabled {
            return;
        }
        policy.enabled = enabled;
        let stale_time = policy.stale_time;
        if enabled {
            self.activate(key, entry, stale_time);
        } else {
            self.sync_poll(key, entry, false);
        }
    }

    /// Fetches now unless a fetch is already in flight.
    pub(crate) fn refetch(&self, key: &QueryKey) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            if entry.in_flight.is_none() {
                self.start_fetch(key, entry);
            }
        }
    }

    fn activate(&self, key: &QueryKey, entry: &mut Entry, stale_time: Duration) {
        if entry.in_flight.is_some() {
            debug!(%key, "Joining in-flight fetch");
            return;
        }
        if entry.needs_fetch(stale_time, Instant::now()) {
            self.start_fetch(key, entry);
        } else {
            debug!(%key, "Cache HIT");
            self.sync_poll(key, entry, false);
        }
    }

    fn start_fetch(&self, key: &QueryKey, entry: &mut Entry) {
        let Some(fetch_fn) = entry.fetch_fn.clone() else {
            return;
        };
        let fetch_id = self.next_id();
        entry.in_flight = Some(fetch_id);
        entry.refetch_queued = false;
        entry.cancel_poll();
        entry.snapshot.send_modify(|s| {
            s.status = QueryStatus::Loading;
            s.is_fetching = true;
        });

        let (retry, retry_delay) = (entry.retry, entry.retry_delay);
        let weak = Arc::downgrade(&self.shared);
        let key = key.clone();
        debug!(%key, fetch_id, "Fetch started");
        tokio::spawn(async move {
            let result = with_retry(|| fetch_fn(), retry, retry_delay).await;
            if let Some(shared) = weak.upgrade() {
                QueryCache::from_shared(shared).complete(key, fetch_id, result);
            }
        });
    }

    fn complete(&self, key: QueryKey, fetch_id: u64, result: Result<AnyValue, QueryError>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&key) else {
            debug!(%key, fetch_id, "Discarding result for evicted entry");
            return;
        };
        if entry.in_flight != Some(fetch_id) {
            debug!(%key, fetch_id, "Discarding superseded result");
            return;
        }
        entry.in_flight = None;
        let requeue = std::mem::take(&mut entry.refetch_queued);
        let now = Instant::now();

        match result {
            Ok(value) => {
                debug!(%key, fetch_id, "Fetch succeeded");
                entry.snapshot.send_modify(|s| {
                    s.status = QueryStatus::Success;
                    s.data = Some(value);
                    s.error = None;
                    s.updated_at = Some(now);
                    s.is_fetching = false;
                    s.is_invalidated = requeue;
                });
            }
            Err(err) => {
                debug!(%key, fetch_id, error = %err, "Fetch failed");
                entry.snapshot.send_modify(|s| {
                    s.status = QueryStatus::Error;
                    s.error = Some(err);
                    s.is_fetching = false;
                    s.is_invalidated |= requeue;
                });
            }
        }

        if requeue && entry.has_active_observers() {
            self.start_fetch(&key, entry);
        } else {
            self.sync_poll(&key, entry, true);
        }

        // Eviction was held back while this fetch ran.
        if entry.observers.is_empty() && !self.schedule_gc(&key, entry) {
            entries.remove(&key);
        }
    }

    /// Brings the poll timer in line with the enabled subscribers. `restart`
    /// forces a fresh period, as after a completed fetch.
    fn sync_poll(&self, key: &QueryKey, entry: &mut Entry, restart: bool) {
        // While a fetch is in flight the timer restarts on completion.
        let desired = if entry.in_flight.is_none() {
            entry.poll_interval()
        } else {
            None
        };
        if !restart && desired == entry.poll_every && (desired.is_none() || entry.poll.is_some()) {
            return;
        }
        entry.cancel_poll();
        let Some(interval) = desired else {
            return;
        };

        let id = self.next_id();
        let weak = Arc::downgrade(&self.shared);
        let timer_key = key.clone();
        let handle = spawn_timer(async move {
            tokio::time::sleep(interval).await;
            if let Some(shared) = weak.upgrade() {
                QueryCache::from_shared(shared).poll_tick(&timer_key, id);
            }
        });
        if let Some(handle) = handle {
            entry.poll = Some(Scheduled { id, handle });
            entry.poll_every = Some(interval);
        }
    }

    fn poll_tick(&self, key: &QueryKey, id: u64) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.poll.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        entry.poll = None;
        entry.poll_every = None;
        if entry.in_flight.is_none() && entry.has_active_observers() {
            debug!(%key, "Poll interval elapsed");
            self.start_fetch(key, entry);
        }
    }

    /// Returns `false` when no runtime is around to run the timer.
    fn schedule_gc(&self, key: &QueryKey, entry: &mut Entry) -> bool {
        if let Some(gc) = entry.gc.take() {
            gc.handle.abort();
        }
        let id = self.next_id();
        let gc_time = entry.gc_time;
        let weak = Arc::downgrade(&self.shared);
        let timer_key = key.clone();
        let handle = spawn_timer(async move {
            tokio::time::sleep(gc_time).await;
            if let Some(shared) = weak.upgrade() {
                QueryCache::from_shared(shared).evict(&timer_key, id);
            }
        });
        match handle {
            Some(handle) => {
                debug!(%key, ?gc_time, "Eviction scheduled");
                entry.gc = Some(Scheduled { id, handle });
                true
            }
            None => false,
        }
    }

    fn evict(&self, key: &QueryKey, id: u64) {
        let mut entries = self.lock();
        // An entry with a fetch in flight is rescheduled once that fetch completes.
        let idle = entries.get(key).is_some_and(|e| {
            e.observers.is_empty()
                && e.in_flight.is_none()
                && e.gc.as_ref().map(|g| g.id) == Some(id)
        });
        if idle {
            entries.remove(key);
            debug!(%key, "Evicted idle entry");
        }
    }
}
