//! The realtime sync bridge.
//!
//! Subscribes one channel per watched table and reconciles the query
//! caches from delivered change events: flat tables get minimal in-place
//! patches, relationally-joined tables get a debounced invalidate +
//! refetch (a joined payload cannot be reconstructed from a single row).
//!
//! There is no automatic reconnection: a channel that errors or closes
//! stays down until the owner calls [`RealtimeBridge::subscribe`] again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use lexsync_proto::change::{ChangeEvent, Table, WATCHED_TABLES};

use super::stream::{ChangeStream, SubscriptionId};
use super::{ChannelState, StreamError, SyncNotice};
use crate::query::QueryError;
use crate::remote::RemoteDataClient;
use crate::repository::Repository;
use crate::stores::{CASES_QUERY, DataStores, TASKS_QUERY};

/// Which owning query a relational change event refetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RefetchTarget {
    /// The joined tasks query (task rows and both join tables).
    Tasks,
    /// The legal cases query.
    Cases,
}

/// One live table channel owned by the bridge.
struct ChannelHandle {
    id: SubscriptionId,
    state: watch::Receiver<ChannelState>,
    task: tokio::task::JoinHandle<()>,
}

/// State shared with the bridge's event tasks.
struct BridgeContext<B> {
    stores: DataStores,
    repo: Arc<Repository<B>>,
    debounce: Duration,
    notices: mpsc::Sender<SyncNotice>,
    pending: Mutex<HashSet<RefetchTarget>>,
}

/// Keeps the query caches eventually consistent with server-side mutations
/// via per-table change-notification channels.
pub struct RealtimeBridge<B, S> {
    stream: S,
    ctx: Arc<BridgeContext<B>>,
    channels: Mutex<HashMap<Table, ChannelHandle>>,
}

impl<B, S> RealtimeBridge<B, S>
where
    B: RemoteDataClient + Send + Sync + 'static,
    S: ChangeStream,
{
    /// Creates a bridge and the receiver of its transient notices.
    #[must_use]
    pub fn new(
        stream: S,
        stores: DataStores,
        repo: Arc<Repository<B>>,
        debounce: Duration,
        notice_buffer: usize,
    ) -> (Self, mpsc::Receiver<SyncNotice>) {
        let (notices, notice_rx) = mpsc::channel(notice_buffer);
        (
            Self {
                stream,
                ctx: Arc::new(BridgeContext {
                    stores,
                    repo,
                    debounce,
                    notices,
                    pending: Mutex::new(HashSet::new()),
                }),
                channels: Mutex::new(HashMap::new()),
            },
            notice_rx,
        )
    }

    /// Subscribes the bridge to one table.
    ///
    /// Exactly one channel exists per table: any previous channel for the
    /// same table is torn down first so events are never applied twice.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] when the stream cannot open the channel.
    pub async fn subscribe(&self, table: Table) -> Result<(), StreamError> {
        if let Some(old) = self.channels.lock().remove(&table) {
            tracing::debug!(table = %table, old = %old.id, "tearing down previous channel");
            old.task.abort();
        }

        let sub = self.stream.subscribe(table).await?;
        let state = sub.state.clone();
        let id = sub.id;
        tracing::info!(table = %table, subscription = %id, "table channel subscribed");

        let ctx = Arc::clone(&self.ctx);
        let mut events = sub.events;
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle_event(&ctx, &event);
            }
            tracing::debug!(table = %table, "event channel ended");
        });

        self.channels
            .lock()
            .insert(table, ChannelHandle { id, state, task });
        Ok(())
    }

    /// Subscribes every watched table.
    ///
    /// # Errors
    ///
    /// Returns the first [`StreamError`] encountered; tables subscribed
    /// before the failure stay live.
    pub async fn subscribe_all(&self) -> Result<(), StreamError> {
        for table in WATCHED_TABLES {
            self.subscribe(table).await?;
        }
        Ok(())
    }

    /// Current state of one table's channel.
    pub fn channel_state(&self, table: Table) -> ChannelState {
        self.channels
            .lock()
            .get(&table)
            .map_or(ChannelState::Unsubscribed, |handle| *handle.state.borrow())
    }

    /// Whether every watched table's channel is live.
    pub fn is_live(&self) -> bool {
        WATCHED_TABLES
            .iter()
            .all(|table| self.channel_state(*table).is_live())
    }

    /// Tears down every channel. Interest in cache updates ends here; any
    /// in-flight fetch shared with other subscribers stays owned by the
    /// query cache.
    pub fn shutdown(&self) {
        let mut channels = self.channels.lock();
        for (table, handle) in channels.drain() {
            tracing::debug!(table = %table, subscription = %handle.id, "tearing down channel");
            handle.task.abort();
        }
    }
}

/// Routes one delivered event: notice, then patch or debounced refetch.
fn handle_event<B>(ctx: &Arc<BridgeContext<B>>, event: &ChangeEvent)
where
    B: RemoteDataClient + Send + Sync + 'static,
{
    tracing::debug!(table = %event.table, op = ?event.op, row = ?event.row_id(), "change event");

    if notice_worthy(event.table) {
        let notice = SyncNotice {
            table: event.table,
            op: event.op,
            row_id: event.row_id(),
        };
        if ctx.notices.try_send(notice).is_err() {
            tracing::debug!(table = %event.table, "notice channel full or closed, dropping");
        }
    }

    if event.table.is_flat() {
        ctx.stores.apply_flat_patch(event);
    } else {
        schedule_refetch(ctx, event.table);
    }
}

/// Tables whose mutations surface a transient user-visible notice.
/// Join-table churn is internal detail and stays silent.
const fn notice_worthy(table: Table) -> bool {
    matches!(
        table,
        Table::Tasks | Table::Cases | Table::Clients | Table::Employees | Table::Notes
    )
}

/// Schedules a debounced invalidate + refetch of the owning query.
///
/// Bursts of related events (a task update plus its join-table rows)
/// coalesce into a single refetch per debounce window.
fn schedule_refetch<B>(ctx: &Arc<BridgeContext<B>>, table: Table)
where
    B: RemoteDataClient + Send + Sync + 'static,
{
    let target = match table {
        Table::Tasks | Table::TaskResponsible | Table::TaskDesignated => RefetchTarget::Tasks,
        Table::Cases => RefetchTarget::Cases,
        _ => return,
    };

    {
        let mut pending = ctx.pending.lock();
        if !pending.insert(target) {
            // A refetch for this target is already scheduled; coalesce.
            return;
        }
    }

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        tokio::time::sleep(ctx.debounce).await;
        ctx.pending.lock().remove(&target);

        let result = match target {
            RefetchTarget::Tasks => {
                ctx.stores.tasks.invalidate(TASKS_QUERY);
                let repo = Arc::clone(&ctx.repo);
                ctx.stores
                    .tasks
                    .refetch(TASKS_QUERY, move || {
                        let repo = Arc::clone(&repo);
                        async move {
                            repo.load_tasks()
                                .await
                                .map_err(|e| QueryError::Fetch(e.to_string()))
                        }
                    })
                    .await
                    .map(|_| ())
            }
            RefetchTarget::Cases => {
                ctx.stores.cases.invalidate(CASES_QUERY);
                let repo = Arc::clone(&ctx.repo);
                ctx.stores
                    .cases
                    .refetch(CASES_QUERY, move || {
                        let repo = Arc::clone(&repo);
                        async move {
                            repo.load_cases()
                                .await
                                .map_err(|e| QueryError::Fetch(e.to_string()))
                        }
                    })
                    .await
                    .map(|_| ())
            }
        };

        if let Err(error) = result {
            tracing::warn!(?target, %error, "refetch after change events failed");
        }
    });
}
