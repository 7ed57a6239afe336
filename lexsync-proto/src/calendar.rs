//! Calendar event payloads for the REST proxy surface.
//!
//! These types cross the JSON boundary between UI clients, the gateway, and
//! the external calendar provider. The proxy validates presence of the
//! required fields before anything reaches the provider.

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// A calendar event as submitted by a client (create/update body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventPayload {
    /// Event title. Required.
    #[serde(default)]
    pub title: String,
    /// Start instant, RFC 3339. Required.
    #[serde(default)]
    pub start: String,
    /// End instant, RFC 3339. Required.
    #[serde(default)]
    pub end: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional linked task; at most one event may exist per task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl EventPayload {
    /// Returns the name of the first missing required field, if any.
    ///
    /// Required fields are `title`, `start`, and `end`; whitespace-only
    /// values count as missing.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.start.trim().is_empty() {
            Some("start")
        } else if self.end.trim().is_empty() {
            Some("end")
        } else {
            None
        }
    }
}

/// A calendar event as stored by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned event identifier.
    pub id: String,
    /// The event body.
    #[serde(flatten)]
    pub payload: EventPayload,
}
