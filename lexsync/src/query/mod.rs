//! Declarative query cache: keys, staleness policy, and the cache itself.
//!
//! Each logical query is identified by a [`QueryKey`] (a root segment plus
//! an optional scope, e.g. `tareas` or `notas:42`). The cache serves
//! stale-but-valid data immediately, de-duplicates concurrent fetches per
//! key, and evicts entries nobody has used for longer than their GC window.

pub mod cache;

pub use cache::{QueryCache, QuerySubscription};

use std::time::Duration;

/// Identity of a logical query: a root segment and an optional scope.
///
/// Scoped keys parameterize per-entity queries, e.g. the notes of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    root: &'static str,
    scope: Option<i64>,
}

impl QueryKey {
    /// A key with no scope, e.g. `tareas`.
    #[must_use]
    pub const fn root(root: &'static str) -> Self {
        Self { root, scope: None }
    }

    /// A key scoped to one row, e.g. `notas:42`.
    #[must_use]
    pub const fn scoped(root: &'static str, scope: i64) -> Self {
        Self {
            root,
            scope: Some(scope),
        }
    }

    /// The root segment of the key.
    #[must_use]
    pub const fn root_name(self) -> &'static str {
        self.root
    }

    /// The scope of the key, if any.
    #[must_use]
    pub const fn scope(self) -> Option<i64> {
        self.scope
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "{}:{scope}", self.root),
            None => write!(f, "{}", self.root),
        }
    }
}

/// Default GC window for entities without an explicit one.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Per-query staleness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Age after which cached data is stale and eligible for background
    /// refetch on next access. Zero means always stale.
    pub stale_time: Duration,
    /// Age of disuse after which an unsubscribed entry is evicted entirely.
    pub gc_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: DEFAULT_GC_TIME,
        }
    }
}

impl QueryConfig {
    /// Builds a policy; a `None` GC window uses the default.
    #[must_use]
    pub fn new(stale_time: Duration, gc_time: Option<Duration>) -> Self {
        Self {
            stale_time,
            gc_time: gc_time.unwrap_or(DEFAULT_GC_TIME),
        }
    }
}

/// Errors surfaced to query consumers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The fetch failed after its single retry.
    #[error("query fetch failed: {0}")]
    Fetch(String),
    /// The in-flight fetch was abandoned before producing a result.
    #[error("query fetch abandoned")]
    Abandoned,
}

/// Cache lifecycle events broadcast to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    /// The payload for a key changed (fetch completed or local patch).
    Updated(QueryKey),
    /// A key was marked stale; mounted consumers should refetch.
    Invalidated(QueryKey),
    /// A fetch for a key failed after retry.
    Errored(QueryKey),
}

impl QueryEvent {
    /// The key the event concerns.
    #[must_use]
    pub const fn key(self) -> QueryKey {
        match self {
            Self::Updated(k) | Self::Invalidated(k) | Self::Errored(k) => k,
        }
    }
}
