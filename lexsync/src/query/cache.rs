//! The query cache: single-flight fetches, stale-while-revalidate, GC.
//!
//! One `QueryCache<T>` instance serves one entity family (one payload
//! type); scoped keys parameterize it (e.g. notes per case). Payloads are
//! handed out as `Arc<T>` snapshots — consumers never mutate them in
//! place; all mutation goes through [`QueryCache::set_query_data`] or a
//! refetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use super::{QueryConfig, QueryError, QueryEvent, QueryKey};

/// Fixed delay before the single retry of a failed fetch.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Capacity of the cache's event broadcast channel.
const EVENT_BUFFER: usize = 64;

type FetchResult<T> = Result<Arc<T>, QueryError>;
type InflightRx<T> = watch::Receiver<Option<FetchResult<T>>>;
type InflightTx<T> = watch::Sender<Option<FetchResult<T>>>;

struct Entry<T> {
    data: Option<Arc<T>>,
    error: Option<QueryError>,
    updated_at: Option<Instant>,
    last_access: Instant,
    invalidated: bool,
    subscribers: usize,
    inflight: Option<InflightRx<T>>,
}

impl<T> Entry<T> {
    fn new() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            last_access: Instant::now(),
            invalidated: false,
            subscribers: 0,
            inflight: None,
        }
    }

    /// Fresh entries are served without touching the network.
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self.data.is_some()
            && self
                .updated_at
                .is_some_and(|at| at.elapsed() < stale_time)
    }
}

struct Inner<T> {
    entries: Mutex<HashMap<QueryKey, Entry<T>>>,
    config: QueryConfig,
    retry_delay: Duration,
    events: broadcast::Sender<QueryEvent>,
}

/// Declarative cache for one entity family, keyed by [`QueryKey`].
///
/// Cheap to clone; clones share the same store.
pub struct QueryCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// What `fetch` decided to do while holding the entry lock.
enum Plan<T> {
    /// Entry is fresh — serve it directly.
    Fresh(Arc<T>),
    /// Another caller's fetch is in flight — await its result.
    Follow(InflightRx<T>),
    /// This caller leads the fetch; `stale` carries data to serve
    /// immediately while the refresh runs in the background.
    Lead {
        tx: InflightTx<T>,
        stale: Option<Arc<T>>,
    },
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    /// Creates a cache with the given staleness policy and the default
    /// retry delay.
    #[must_use]
    pub fn new(config: QueryConfig) -> Self {
        Self::with_retry_delay(config, DEFAULT_RETRY_DELAY)
    }

    /// Creates a cache with an explicit retry delay.
    #[must_use]
    pub fn with_retry_delay(config: QueryConfig, retry_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                config,
                retry_delay,
                events,
            }),
        }
    }

    /// Fetches the payload for a key.
    ///
    /// Fresh data is returned without running the fetcher. Stale data is
    /// returned immediately while a background refresh runs. Absent data
    /// awaits the fetch. Concurrent callers of the same key share a single
    /// in-flight fetch; a failed fetch is retried once after a fixed delay,
    /// then the error is surfaced to every waiter.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the fetch (and its retry) fail, or when
    /// a shared in-flight fetch is abandoned.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> FetchResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let plan = self.plan(key, false);
        match plan {
            Plan::Fresh(data) => Ok(data),
            Plan::Follow(rx) => follow(rx).await,
            Plan::Lead {
                tx,
                stale: Some(data),
            } => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let _ = run_fetch(inner, key, fetcher, tx).await;
                });
                Ok(data)
            }
            Plan::Lead { tx, stale: None } => {
                run_fetch(Arc::clone(&self.inner), key, fetcher, tx).await
            }
        }
    }

    /// Fetches the payload for a key, bypassing freshness entirely.
    ///
    /// Always awaits an authoritative result; still shares any in-flight
    /// fetch rather than starting a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the fetch (and its retry) fail, or when
    /// a shared in-flight fetch is abandoned.
    pub async fn refetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> FetchResult<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, QueryError>> + Send,
    {
        let plan = self.plan(key, true);
        match plan {
            Plan::Fresh(data) => Ok(data),
            Plan::Follow(rx) => follow(rx).await,
            Plan::Lead { tx, .. } => run_fetch(Arc::clone(&self.inner), key, fetcher, tx).await,
        }
    }

    /// Decides how to serve a fetch while holding the entry lock.
    fn plan(&self, key: QueryKey, force: bool) -> Plan<T> {
        let mut entries = self.inner.entries.lock();
        gc_locked(&mut entries, self.inner.config.gc_time);
        let entry = entries.entry(key).or_insert_with(Entry::new);
        entry.last_access = Instant::now();

        if !force
            && entry.is_fresh(self.inner.config.stale_time)
            && let Some(data) = entry.data.clone()
        {
            return Plan::Fresh(data);
        }
        if let Some(rx) = entry.inflight.clone() {
            return Plan::Follow(rx);
        }
        let (tx, rx) = watch::channel(None);
        entry.inflight = Some(rx);
        let stale = if force { None } else { entry.data.clone() };
        Plan::Lead { tx, stale }
    }

    /// Returns the current snapshot without fetching.
    pub fn get(&self, key: QueryKey) -> Option<Arc<T>> {
        let mut entries = self.inner.entries.lock();
        let entry = entries.get_mut(&key)?;
        entry.last_access = Instant::now();
        entry.data.clone()
    }

    /// Returns the entry's error state, if its last fetch failed.
    pub fn error(&self, key: QueryKey) -> Option<QueryError> {
        self.inner.entries.lock().get(&key)?.error.clone()
    }

    /// Synchronously replaces the payload via a pure function of the
    /// previous payload. Used for optimistic local patches ahead of server
    /// confirmation; a racing authoritative refetch overwrites the patch.
    pub fn set_query_data(&self, key: QueryKey, updater: impl FnOnce(Option<&T>) -> T) {
        {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key).or_insert_with(Entry::new);
            let next = updater(entry.data.as_deref());
            entry.data = Some(Arc::new(next));
            entry.updated_at = Some(Instant::now());
            entry.last_access = Instant::now();
            entry.invalidated = false;
            entry.error = None;
        }
        let _ = self.inner.events.send(QueryEvent::Updated(key));
    }

    /// Marks one key stale. Mounted consumers observe
    /// [`QueryEvent::Invalidated`] and refetch.
    pub fn invalidate(&self, key: QueryKey) {
        {
            let mut entries = self.inner.entries.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.invalidated = true;
            }
        }
        let _ = self.inner.events.send(QueryEvent::Invalidated(key));
    }

    /// Marks every key under a root stale (all scopes).
    pub fn invalidate_root(&self, root: &'static str) {
        let keys: Vec<QueryKey> = {
            let mut entries = self.inner.entries.lock();
            entries
                .iter_mut()
                .filter(|(k, _)| k.root_name() == root)
                .map(|(k, entry)| {
                    entry.invalidated = true;
                    *k
                })
                .collect()
        };
        for key in keys {
            let _ = self.inner.events.send(QueryEvent::Invalidated(key));
        }
    }

    /// Registers a consumer's interest in a key. Entries with subscribers
    /// are exempt from GC; dropping the subscription releases the interest.
    #[must_use]
    pub fn subscribe(&self, key: QueryKey) -> QuerySubscription<T> {
        {
            let mut entries = self.inner.entries.lock();
            entries.entry(key).or_insert_with(Entry::new).subscribers += 1;
        }
        QuerySubscription {
            inner: Arc::clone(&self.inner),
            key,
            events: self.inner.events.subscribe(),
        }
    }

    /// A receiver for all cache events, regardless of key.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<QueryEvent> {
        self.inner.events.subscribe()
    }

    /// Whether an entry (even an empty one) exists for the key.
    pub fn contains(&self, key: QueryKey) -> bool {
        self.inner.entries.lock().contains_key(&key)
    }
}

/// Registered interest in one query key, plus a filtered event stream.
///
/// Dropping the subscription releases the GC exemption. It does not cancel
/// an in-flight fetch — shared fetches are owned by the cache.
pub struct QuerySubscription<T> {
    inner: Arc<Inner<T>>,
    key: QueryKey,
    events: broadcast::Receiver<QueryEvent>,
}

impl<T> QuerySubscription<T> {
    /// The key this subscription watches.
    #[must_use]
    pub const fn key(&self) -> QueryKey {
        self.key
    }

    /// Awaits the next event concerning this subscription's key.
    ///
    /// Returns `None` when the cache has been dropped. Lagged broadcast
    /// slots are skipped.
    pub async fn next_event(&mut self) -> Option<QueryEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) if event.key() == self.key => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
        }
    }
}

/// Evicts entries unused past the GC window, with no subscribers and no
/// fetch in flight. Called opportunistically under the entry lock.
fn gc_locked<T>(entries: &mut HashMap<QueryKey, Entry<T>>, gc_time: Duration) {
    entries.retain(|_, entry| {
        entry.subscribers > 0
            || entry.inflight.is_some()
            || entry.last_access.elapsed() < gc_time
    });
}

/// Awaits the result of another caller's in-flight fetch.
async fn follow<T>(mut rx: InflightRx<T>) -> FetchResult<T> {
    loop {
        if let Some(result) = rx.borrow_and_update().clone() {
            return result;
        }
        if rx.changed().await.is_err() {
            return Err(QueryError::Abandoned);
        }
    }
}

/// Runs the fetcher (with its single retry), records the outcome on the
/// entry, and wakes every follower.
async fn run_fetch<T, F, Fut>(
    inner: Arc<Inner<T>>,
    key: QueryKey,
    fetcher: F,
    tx: InflightTx<T>,
) -> FetchResult<T>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, QueryError>> + Send,
{
    let result = match fetcher().await {
        Ok(data) => Ok(data),
        Err(first) => {
            tracing::warn!(key = %key, error = %first, "query fetch failed, retrying once");
            tokio::time::sleep(inner.retry_delay).await;
            fetcher().await
        }
    };

    let outcome: FetchResult<T> = result.map(Arc::new);
    {
        let mut entries = inner.entries.lock();
        let entry = entries.entry(key).or_insert_with(Entry::new);
        entry.inflight = None;
        match &outcome {
            Ok(data) => {
                entry.data = Some(Arc::clone(data));
                entry.error = None;
                entry.updated_at = Some(Instant::now());
                entry.invalidated = false;
            }
            Err(error) => {
                tracing::warn!(key = %key, error = %error, "query fetch failed after retry");
                entry.error = Some(error.clone());
            }
        }
    }
    let _ = tx.send(Some(outcome.clone()));
    let event = match &outcome {
        Ok(_) => QueryEvent::Updated(key),
        Err(_) => QueryEvent::Errored(key),
    };
    let _ = inner.events.send(event);
    outcome
}
