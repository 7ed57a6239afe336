//! Short-lived TTL cache for ad hoc memoization.
//!
//! [`TtlCache`] is the manual fallback cache: a keyed store with per-entry
//! expiry, independent of the declarative query cache. It holds auxiliary
//! computed values (e.g. the resolved task ordering column), never
//! task/employee/state data — that belongs to [`crate::query::QueryCache`].
//!
//! Reads are side-effecting: an expired entry is evicted by the `get` that
//! observes it. Eviction-then-return and overwrite are each two coupled
//! steps, so the underlying map is guarded by a mutex.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Default entry lifetime: five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// A keyed value store with per-entry expiry and lazy eviction.
///
/// Entries become invisible once their age reaches the cache's TTL and are
/// removed by the next read that touches them. Timestamps use
/// [`tokio::time::Instant`] so tests can drive expiry with a paused clock.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache with the default five-minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates an empty cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stores a value, unconditionally overwriting any existing entry and
    /// restarting its lifetime.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Returns the stored value if present and not expired.
    ///
    /// An expired entry is evicted by this call (lazy eviction) and `None`
    /// is returned.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Whether a live value exists for the key.
    ///
    /// Equivalent to `get(key).is_some()`, including the eviction side
    /// effect on an expired entry.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes one entry, returning whether it existed.
    pub fn clear(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Removes every entry.
    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }

    /// Removes every entry whose key contains the given substring,
    /// returning how many were removed.
    ///
    /// A linear scan, meant for coarse invalidation of one key family
    /// (e.g. everything derived from the `tareas` table).
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        before - entries.len()
    }

    /// Number of entries currently stored, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
