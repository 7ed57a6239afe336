//! Change-notification streams.
//!
//! [`ChangeStream`] is the seam between the bridge and the platform's
//! change feed. [`LoopbackHub`] is the in-process implementation used in
//! tests and alongside [`crate::remote::MemoryBackend`]; [`WsStream`]
//! speaks the gateway's `/realtime` WebSocket protocol.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use lexsync_proto::change::{ChangeEvent, Table};
use lexsync_proto::realtime::{self, RealtimeMessage};

use super::{ChannelState, StreamError};

/// Per-subscription event buffer.
const EVENT_BUFFER: usize = 256;

/// Timeout for connecting to the gateway.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a `Subscribed` acknowledgment.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Unique identity of one subscription channel (time-ordered UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a fresh channel identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live table subscription: its event feed and observable state.
pub struct TableSubscription {
    /// Channel identity.
    pub id: SubscriptionId,
    /// Table being watched.
    pub table: Table,
    /// Delivered change events, in per-table commit order.
    pub events: mpsc::Receiver<ChangeEvent>,
    /// Observable [`ChannelState`]; terminal states mean tear down and
    /// resubscribe explicitly.
    pub state: watch::Receiver<ChannelState>,
}

impl TableSubscription {
    /// Current state of the channel.
    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        *self.state.borrow()
    }
}

/// A source of per-table change-event subscriptions.
pub trait ChangeStream: Send + Sync {
    /// Opens a channel delivering change events for one table.
    ///
    /// The returned subscription is live (`Subscribed`) on success.
    fn subscribe(
        &self,
        table: Table,
    ) -> impl Future<Output = Result<TableSubscription, StreamError>> + Send;
}

// ---------------------------------------------------------------------------
// Loopback
// ---------------------------------------------------------------------------

struct HubEntry {
    id: SubscriptionId,
    events: mpsc::Sender<ChangeEvent>,
    state: watch::Sender<ChannelState>,
}

/// In-process change-event fan-out hub.
///
/// [`crate::remote::MemoryBackend`] publishes every mutation here, making
/// the backend-plus-stream pair behave like the hosted platform for tests.
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HashMap<Table, Vec<HubEntry>>>>,
}

impl LoopbackHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fans an event out to every live subscription on its table,
    /// returning how many received it.
    ///
    /// Subscriptions whose receiver is gone are dropped. A full event
    /// buffer drops the event for that subscriber with a warning — the
    /// consumer is expected to drain faster than commits arrive.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.get_mut(&event.table) else {
            return 0;
        };
        let mut delivered = 0;
        entries.retain(|entry| match entry.events.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    table = %event.table,
                    subscription = %entry.id,
                    "subscriber event buffer full, dropping event"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Simulates the server closing every channel on a table.
    pub fn close_table(&self, table: Table) {
        self.terminate(table, ChannelState::Closed);
    }

    /// Simulates a channel error on every channel of a table.
    pub fn fail_table(&self, table: Table) {
        self.terminate(table, ChannelState::ChannelError);
    }

    /// Number of live subscriptions on a table.
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.inner.lock().get(&table).map_or(0, Vec::len)
    }

    fn terminate(&self, table: Table, state: ChannelState) {
        let mut inner = self.inner.lock();
        if let Some(entries) = inner.remove(&table) {
            for entry in entries {
                let _ = entry.state.send(state);
            }
        }
    }
}

impl ChangeStream for LoopbackHub {
    async fn subscribe(&self, table: Table) -> Result<TableSubscription, StreamError> {
        let id = SubscriptionId::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ChannelState::Subscribing);
        let _ = state_tx.send(ChannelState::Subscribed);

        self.inner.lock().entry(table).or_default().push(HubEntry {
            id,
            events: event_tx,
            state: state_tx,
        });

        tracing::debug!(table = %table, subscription = %id, "loopback channel subscribed");
        Ok(TableSubscription {
            id,
            table,
            events: event_rx,
            state: state_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

struct WsEntry {
    id: SubscriptionId,
    events: mpsc::Sender<ChangeEvent>,
    state: watch::Sender<ChannelState>,
}

type WsRegistry = Arc<Mutex<HashMap<Table, WsEntry>>>;

/// Change stream over the gateway's `/realtime` WebSocket.
///
/// Created via [`WsStream::connect`], which establishes the connection and
/// spawns reader/writer tasks. One WebSocket carries every table channel;
/// frames are demultiplexed to per-table subscriptions by the reader.
pub struct WsStream {
    registry: WsRegistry,
    outgoing: mpsc::Sender<RealtimeMessage>,
    connected: Arc<AtomicBool>,
    _reader: tokio::task::JoinHandle<()>,
    _writer: tokio::task::JoinHandle<()>,
}

impl WsStream {
    /// Connects to the gateway's realtime endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Connect`] on an invalid URL, an unreachable
    /// gateway, or a connect timeout.
    pub async fn connect(gateway_url: &str) -> Result<Self, StreamError> {
        url::Url::parse(gateway_url)
            .map_err(|e| StreamError::Connect(format!("invalid gateway url: {e}")))?;

        let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(gateway_url))
            .await
            .map_err(|_| {
                tracing::warn!(url = gateway_url, "gateway connect timed out");
                StreamError::Connect("connect timed out".to_string())
            })?
            .map_err(|e| {
                tracing::warn!(url = gateway_url, error = %e, "gateway connect failed");
                StreamError::Connect(e.to_string())
            })?;

        let (ws_sink, ws_reader) = ws.split();
        let registry: WsRegistry = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let (outgoing, outgoing_rx) = mpsc::channel::<RealtimeMessage>(EVENT_BUFFER);

        let reader = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&registry),
            Arc::clone(&connected),
        ));
        let writer = tokio::spawn(writer_loop(ws_sink, outgoing_rx, Arc::clone(&connected)));

        tracing::info!(url = gateway_url, "connected to realtime gateway");
        Ok(Self {
            registry,
            outgoing,
            connected,
            _reader: reader,
            _writer: writer,
        })
    }

    /// Injects a committed change for fan-out (producer side).
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the connection is gone.
    pub async fn publish(&self, event: ChangeEvent) -> Result<(), StreamError> {
        self.outgoing
            .send(RealtimeMessage::Publish(event))
            .await
            .map_err(|_| StreamError::Closed)
    }

    /// Whether the WebSocket connection is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl ChangeStream for WsStream {
    async fn subscribe(&self, table: Table) -> Result<TableSubscription, StreamError> {
        if !self.is_connected() {
            return Err(StreamError::Closed);
        }

        let id = SubscriptionId::new();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, state_rx) = watch::channel(ChannelState::Subscribing);

        // One channel per table: replacing an existing entry closes the old
        // channel first so events are never delivered twice.
        if let Some(old) = self.registry.lock().insert(
            table,
            WsEntry {
                id,
                events: event_tx,
                state: state_tx,
            },
        ) {
            tracing::debug!(table = %table, old = %old.id, "replacing existing table channel");
            let _ = old.state.send(ChannelState::Closed);
        }

        self.outgoing
            .send(RealtimeMessage::Subscribe { table })
            .await
            .map_err(|_| StreamError::Closed)?;

        // Wait for the gateway's acknowledgment.
        let mut state = state_rx.clone();
        let ack = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async move {
            loop {
                match *state.borrow_and_update() {
                    ChannelState::Subscribed => return Ok(()),
                    ChannelState::ChannelError | ChannelState::Closed => {
                        return Err("channel terminated during subscribe".to_string());
                    }
                    ChannelState::Subscribing | ChannelState::Unsubscribed => {}
                }
                if state.changed().await.is_err() {
                    return Err("stream dropped during subscribe".to_string());
                }
            }
        })
        .await;

        match ack {
            Ok(Ok(())) => Ok(TableSubscription {
                id,
                table,
                events: event_rx,
                state: state_rx,
            }),
            Ok(Err(reason)) => Err(StreamError::Subscribe { table, reason }),
            Err(_) => Err(StreamError::Subscribe {
                table,
                reason: "subscribe acknowledgment timed out".to_string(),
            }),
        }
    }
}

/// Forwards outgoing protocol messages onto the WebSocket.
async fn writer_loop(
    mut ws_sink: impl SinkExt<Message> + Unpin,
    mut outgoing: mpsc::Receiver<RealtimeMessage>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg) = outgoing.recv().await {
        let bytes = match realtime::encode(&msg) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode outgoing realtime message");
                continue;
            }
        };
        if ws_sink.send(Message::Binary(bytes.into())).await.is_err() {
            tracing::warn!("gateway WebSocket write failed");
            break;
        }
    }
    connected.store(false, Ordering::Relaxed);
}

/// Reads gateway frames and demultiplexes them to table channels.
async fn reader_loop(
    mut ws_reader: impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
    + Unpin,
    registry: WsRegistry,
    connected: Arc<AtomicBool>,
) {
    let terminal = loop {
        match ws_reader.next().await {
            Some(Ok(Message::Binary(data))) => match realtime::decode(&data) {
                Ok(RealtimeMessage::Subscribed { table }) => {
                    if let Some(entry) = registry.lock().get(&table) {
                        let _ = entry.state.send(ChannelState::Subscribed);
                    }
                }
                Ok(RealtimeMessage::Event(event)) => {
                    dispatch_event(&registry, event);
                }
                Ok(RealtimeMessage::Error { reason }) => {
                    tracing::warn!(reason = %reason, "gateway reported protocol error");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected realtime message from gateway");
                }
                Err(e) => {
                    // Malformed frame — log and skip, don't disconnect.
                    tracing::warn!(error = %e, "malformed realtime frame, skipping");
                }
            },
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("gateway WebSocket closed");
                break ChannelState::Closed;
            }
            Some(Ok(_)) => {
                // Ignore ping/pong/text frames.
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "gateway WebSocket read error");
                break ChannelState::ChannelError;
            }
        }
    };

    connected.store(false, Ordering::Relaxed);
    let entries: Vec<WsEntry> = registry.lock().drain().map(|(_, entry)| entry).collect();
    for entry in entries {
        let _ = entry.state.send(terminal);
    }
}

/// Routes one delivered event to its table channel.
fn dispatch_event(registry: &WsRegistry, event: ChangeEvent) {
    let mut registry = registry.lock();
    let Some(entry) = registry.get(&event.table) else {
        tracing::debug!(table = %event.table, "event for unsubscribed table, dropping");
        return;
    };
    match entry.events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            tracing::warn!(
                table = %event.table,
                "subscription buffer full, dropping event"
            );
        }
        Err(mpsc::error::TrySendError::Closed(event)) => {
            registry.remove(&event.table);
        }
    }
}
