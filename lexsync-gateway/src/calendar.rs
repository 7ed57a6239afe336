//! Calendar provider abstraction.
//!
//! The REST proxy talks to the external calendar service through
//! [`CalendarProvider`]. [`MemoryCalendar`] is the in-process
//! implementation used in tests; [`RestCalendar`] speaks JSON over HTTP to
//! the configured upstream.
//!
//! The error taxonomy keeps configuration problems (fatal, never retried)
//! distinct from provider failures, and surfaces duplicates (one event per
//! linked task) so callers can fall back to an update in place.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use lexsync_proto::calendar::{CalendarEvent, EventPayload};

/// Errors from calendar operations.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Required server configuration is missing. Fatal to the operation.
    #[error("calendar not configured: {0}")]
    Config(String),

    /// The event payload is invalid.
    #[error("invalid event: {0}")]
    Validation(String),

    /// An event already exists for the same linked task.
    #[error("an event for task {task_id} already exists")]
    Duplicate {
        /// The linked task.
        task_id: i64,
        /// Identifier of the existing event, for the update fallback.
        event_id: String,
    },

    /// The provider rejected or failed the request.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP-like status from the provider.
        status: u16,
        /// Human-readable message.
        message: String,
    },
}

impl CalendarError {
    /// A 404-equivalent provider error for a missing event.
    #[must_use]
    pub fn not_found(id: &str) -> Self {
        Self::Provider {
            status: 404,
            message: format!("event not found: {id}"),
        }
    }
}

/// Async client for the external calendar service.
pub trait CalendarProvider: Send + Sync {
    /// Lists every event on the configured calendar.
    fn list(&self) -> impl Future<Output = Result<Vec<CalendarEvent>, CalendarError>> + Send;

    /// Creates an event. Fails with [`CalendarError::Duplicate`] when an
    /// event already exists for the payload's linked task.
    fn create(
        &self,
        payload: EventPayload,
    ) -> impl Future<Output = Result<CalendarEvent, CalendarError>> + Send;

    /// Replaces an event by identifier.
    fn update(
        &self,
        id: &str,
        payload: EventPayload,
    ) -> impl Future<Output = Result<CalendarEvent, CalendarError>> + Send;

    /// Deletes an event by identifier.
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), CalendarError>> + Send;
}

// ---------------------------------------------------------------------------
// In-memory provider
// ---------------------------------------------------------------------------

/// In-memory calendar for tests and offline development.
///
/// Enforces the one-event-per-task rule the way the real provider does, so
/// the proxy's duplicate fallback is exercised end to end.
#[derive(Debug, Default)]
pub struct MemoryCalendar {
    events: RwLock<Vec<CalendarEvent>>,
    next_id: AtomicU64,
}

impl MemoryCalendar {
    /// Creates an empty calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalendarProvider for MemoryCalendar {
    async fn list(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        Ok(self.events.read().await.clone())
    }

    async fn create(&self, payload: EventPayload) -> Result<CalendarEvent, CalendarError> {
        let mut events = self.events.write().await;
        if let Some(task_id) = payload.task_id
            && let Some(existing) = events
                .iter()
                .find(|e| e.payload.task_id == Some(task_id))
        {
            return Err(CalendarError::Duplicate {
                task_id: task_id.get(),
                event_id: existing.id.clone(),
            });
        }
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let event = CalendarEvent { id, payload };
        events.push(event.clone());
        Ok(event)
    }

    async fn update(&self, id: &str, payload: EventPayload) -> Result<CalendarEvent, CalendarError> {
        let mut events = self.events.write().await;
        let slot = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CalendarError::not_found(id))?;
        slot.payload = payload;
        Ok(slot.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), CalendarError> {
        let mut events = self.events.write().await;
        let index = events
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| CalendarError::not_found(id))?;
        events.remove(index);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// REST provider
// ---------------------------------------------------------------------------

/// JSON-over-HTTP calendar client for the configured upstream service.
pub struct RestCalendar {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    calendar_id: String,
}

impl RestCalendar {
    /// Builds a client for one calendar on the upstream service.
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, calendar_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            calendar_id: calendar_id.to_string(),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url, self.calendar_id
        )
    }

    fn event_url(&self, id: &str) -> String {
        format!("{}/{id}", self.events_url())
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        response.json::<T>().await.map_err(|e| CalendarError::Provider {
            status: status.as_u16(),
            message: format!("malformed provider response: {e}"),
        })
    }
}

fn transport_error(e: &reqwest::Error) -> CalendarError {
    CalendarError::Provider {
        status: e.status().map_or(502, |s| s.as_u16()),
        message: e.to_string(),
    }
}

impl CalendarProvider for RestCalendar {
    async fn list(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        Self::parse(response).await
    }

    async fn create(&self, payload: EventPayload) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        // The provider signals the one-event-per-task conflict with 409 and
        // the existing event in the body.
        if response.status().as_u16() == 409 {
            let existing: CalendarEvent =
                response.json().await.map_err(|e| CalendarError::Provider {
                    status: 409,
                    message: format!("malformed conflict response: {e}"),
                })?;
            return Err(CalendarError::Duplicate {
                task_id: payload.task_id.map_or(0, lexsync_proto::task::TaskId::get),
                event_id: existing.id,
            });
        }
        Self::parse(response).await
    }

    async fn update(&self, id: &str, payload: EventPayload) -> Result<CalendarEvent, CalendarError> {
        let response = self
            .http
            .put(self.event_url(id))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        Self::parse(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), CalendarError> {
        let response = self
            .http
            .delete(self.event_url(id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CalendarError::Provider {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}
