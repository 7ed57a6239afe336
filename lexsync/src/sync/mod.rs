//! Realtime synchronization: channel state machine, change streams, and the
//! bridge that reconciles the query caches.

pub mod bridge;
pub mod stream;

pub use bridge::RealtimeBridge;
pub use stream::{ChangeStream, LoopbackHub, TableSubscription, WsStream};

use lexsync_proto::change::{ChangeOp, Table};

/// Lifecycle of one table subscription.
///
/// `Unsubscribed → Subscribing → Subscribed → (ChannelError | Closed)`.
/// There is no automatic retry out of the terminal states; re-subscription
/// is an explicit caller action (the component-remount analog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No channel exists for the table.
    #[default]
    Unsubscribed,
    /// Subscribe sent, acknowledgment pending.
    Subscribing,
    /// Live: change events are being delivered.
    Subscribed,
    /// The channel failed; it must be torn down and re-established.
    ChannelError,
    /// The channel was closed by the server or the transport.
    Closed,
}

impl ChannelState {
    /// Whether the bridge is live on this channel.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsubscribed => write!(f, "unsubscribed"),
            Self::Subscribing => write!(f, "subscribing"),
            Self::Subscribed => write!(f, "subscribed"),
            Self::ChannelError => write!(f, "channel_error"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Errors from change-stream subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Could not reach or handshake with the stream endpoint.
    #[error("stream connect failed: {0}")]
    Connect(String),

    /// The subscribe request was not acknowledged.
    #[error("subscribe failed for {table}: {reason}")]
    Subscribe {
        /// Table that was being subscribed.
        table: Table,
        /// Human-readable reason.
        reason: String,
    },

    /// The stream closed underneath us.
    #[error("stream closed")]
    Closed,
}

/// A transient, user-visible notification about a remote mutation.
///
/// Delivered over the bridge's notice channel; consumers render and drop
/// them. Rate limiting falls out of the relational debounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncNotice {
    /// Table the mutation happened on.
    pub table: Table,
    /// Kind of mutation.
    pub op: ChangeOp,
    /// Affected row, when the event carried an identifiable payload.
    pub row_id: Option<i64>,
}
