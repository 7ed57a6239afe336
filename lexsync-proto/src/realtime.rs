//! Wire protocol between the engine's WebSocket stream and the gateway.
//!
//! A client subscribes per table and receives [`RealtimeMessage::Event`]
//! frames for every change committed on that table. Producers inject events
//! with [`RealtimeMessage::Publish`]; the gateway fans them out to every
//! connection subscribed to the event's table. Messages are postcard-encoded
//! binary WebSocket frames.

use serde::{Deserialize, Serialize};

use crate::change::{ChangeEvent, Table};

/// Messages exchanged over the `/realtime` WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RealtimeMessage {
    /// Client asks to receive change events for a table.
    Subscribe {
        /// The table to watch.
        table: Table,
    },
    /// Server acknowledges a subscription.
    Subscribed {
        /// The table now being watched.
        table: Table,
    },
    /// Client stops watching a table.
    Unsubscribe {
        /// The table to stop watching.
        table: Table,
    },
    /// Producer injects a committed change for fan-out.
    Publish(ChangeEvent),
    /// Server delivers a change to a subscribed client.
    Event(ChangeEvent),
    /// Server reports a protocol error on this connection.
    Error {
        /// Human-readable reason.
        reason: String,
    },
}

/// Encodes a [`RealtimeMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(msg: &RealtimeMessage) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(msg).map_err(|e| format!("realtime encode error: {e}"))
}

/// Decodes a [`RealtimeMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode(bytes: &[u8]) -> Result<RealtimeMessage, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("realtime decode error: {e}"))
}
