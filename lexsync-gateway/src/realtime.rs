//! Realtime change-event fan-out over WebSocket.
//!
//! Connections subscribe per table and receive every [`ChangeEvent`]
//! published for it. Producers inject events with
//! [`RealtimeMessage::Publish`]; the gateway is the fan-out point standing
//! in for the platform's commit streams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};

use lexsync_proto::change::{ChangeEvent, Table};
use lexsync_proto::realtime::{self, RealtimeMessage};

/// One connected client: its writer channel and subscribed tables.
struct Connection {
    sender: mpsc::UnboundedSender<Message>,
    tables: HashSet<Table>,
}

/// Registry of realtime connections and their table subscriptions.
#[derive(Default)]
pub struct RealtimeState {
    connections: RwLock<HashMap<u64, Connection>>,
    next_conn: AtomicU64,
}

impl RealtimeState {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fans an event out to every connection subscribed to its table,
    /// returning how many received it.
    pub async fn publish(&self, event: &ChangeEvent) -> usize {
        let frame = match realtime::encode(&RealtimeMessage::Event(event.clone())) {
            Ok(bytes) => Message::Binary(bytes.into()),
            Err(e) => {
                tracing::error!(error = %e, "failed to encode change event for fan-out");
                return 0;
            }
        };

        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (conn_id, connection) in connections.iter() {
            if !connection.tables.contains(&event.table) {
                continue;
            }
            if connection.sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(conn = conn_id, "connection gone, skipping delivery");
            }
        }
        delivered
    }

    /// Number of connections subscribed to a table.
    pub async fn subscriber_count(&self, table: Table) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|c| c.tables.contains(&table))
            .count()
    }

    async fn register(&self, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let conn_id = self.next_conn.fetch_add(1, Ordering::SeqCst) + 1;
        self.connections.write().await.insert(
            conn_id,
            Connection {
                sender,
                tables: HashSet::new(),
            },
        );
        conn_id
    }

    async fn unregister(&self, conn_id: u64) {
        self.connections.write().await.remove(&conn_id);
    }

    async fn subscribe(&self, conn_id: u64, table: Table) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(&conn_id) {
            Some(connection) => {
                connection.tables.insert(table);
                true
            }
            None => false,
        }
    }

    async fn unsubscribe(&self, conn_id: u64, table: Table) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&conn_id) {
            connection.tables.remove(&table);
        }
    }
}

/// Handles one upgraded WebSocket connection.
///
/// Lifecycle: register the connection, spawn a writer task, route incoming
/// frames (subscribe/unsubscribe/publish), and unregister on disconnect.
pub async fn handle_socket(socket: WebSocket, state: Arc<RealtimeState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn_id = state.register(tx.clone()).await;
    tracing::info!(conn = conn_id, "realtime connection registered");

    // Writer task: forward queued frames to the socket.
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Reader loop: route protocol messages from this connection.
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_frame(conn_id, &data, &reader_state, &tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(conn = conn_id, "realtime connection closed by client");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    state.unregister(conn_id).await;
    tracing::info!(conn = conn_id, "realtime connection unregistered");
}

/// Routes one binary frame from a connection.
async fn handle_frame(
    conn_id: u64,
    data: &[u8],
    state: &Arc<RealtimeState>,
    tx: &mpsc::UnboundedSender<Message>,
) {
    let msg = match realtime::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(conn = conn_id, error = %e, "malformed realtime frame");
            send_msg(tx, &RealtimeMessage::Error { reason: e });
            return;
        }
    };

    match msg {
        RealtimeMessage::Subscribe { table } => {
            if state.subscribe(conn_id, table).await {
                tracing::debug!(conn = conn_id, table = %table, "subscribed");
                send_msg(tx, &RealtimeMessage::Subscribed { table });
            }
        }
        RealtimeMessage::Unsubscribe { table } => {
            state.unsubscribe(conn_id, table).await;
            tracing::debug!(conn = conn_id, table = %table, "unsubscribed");
        }
        RealtimeMessage::Publish(event) => {
            let delivered = state.publish(&event).await;
            tracing::debug!(
                conn = conn_id,
                table = %event.table,
                delivered = delivered,
                "published change event"
            );
        }
        other => {
            tracing::warn!(conn = conn_id, msg = ?other, "unexpected message from client");
        }
    }
}

/// Encodes and queues a protocol message on a connection's writer channel.
fn send_msg(tx: &mpsc::UnboundedSender<Message>, msg: &RealtimeMessage) {
    if let Ok(bytes) = realtime::encode(msg) {
        let _ = tx.send(Message::Binary(bytes.into()));
    }
}
