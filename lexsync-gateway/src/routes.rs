//! Calendar REST proxy routes.
//!
//! JSON endpoints under `/calendar/events`. Every failure is reported as
//! `{ "error": ..., "details": ... }` with a 4xx/5xx status; success is
//! `{ "success": true, ... }` with 200. Missing server configuration is a
//! configuration error (500), distinct from upstream provider failures
//! (502). A duplicate event for the same linked task falls back to an
//! update in place rather than failing.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use lexsync_proto::calendar::EventPayload;

use crate::calendar::{CalendarError, CalendarProvider};
use crate::server::GatewayState;

/// A REST error response: status plus `{ error, details }` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: String,
}

impl ApiError {
    /// Builds an error response.
    #[must_use]
    pub fn new(status: StatusCode, error: &str, details: impl Into<String>) -> Self {
        Self {
            status,
            error: error.to_string(),
            details: details.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.error, "details": self.details }));
        (self.status, body).into_response()
    }
}

impl From<CalendarError> for ApiError {
    fn from(err: CalendarError) -> Self {
        match &err {
            CalendarError::Config(details) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "calendar_not_configured",
                details.clone(),
            ),
            CalendarError::Validation(details) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_event", details.clone())
            }
            CalendarError::Duplicate { .. } => {
                Self::new(StatusCode::CONFLICT, "duplicate_event", err.to_string())
            }
            CalendarError::Provider { status, message } => {
                let status = if *status == 404 {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_GATEWAY
                };
                Self::new(status, "provider_error", message.clone())
            }
        }
    }
}

/// `GET /calendar/events` — lists every event.
pub async fn list_events<P: CalendarProvider>(
    State(state): State<Arc<GatewayState<P>>>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = state.calendar()?;
    let events = provider.list().await?;
    tracing::debug!(count = events.len(), "listed calendar events");
    Ok(Json(json!({ "success": true, "events": events })))
}

/// `POST /calendar/events` — creates an event, falling back to an update
/// in place when one already exists for the same linked task.
pub async fn create_event<P: CalendarProvider>(
    State(state): State<Arc<GatewayState<P>>>,
    Json(payload): Json<EventPayload>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&payload)?;
    let provider = state.calendar()?;

    match provider.create(payload.clone()).await {
        Ok(event) => {
            tracing::info!(event = %event.id, "calendar event created");
            Ok(Json(json!({ "success": true, "event": event, "updated": false })))
        }
        Err(CalendarError::Duplicate { task_id, event_id }) => {
            tracing::info!(
                task = task_id,
                event = %event_id,
                "duplicate event for task, updating in place"
            );
            let event = provider.update(&event_id, payload).await?;
            Ok(Json(json!({ "success": true, "event": event, "updated": true })))
        }
        Err(err) => Err(err.into()),
    }
}

/// `PUT /calendar/events/{id}` — replaces an event.
pub async fn update_event<P: CalendarProvider>(
    State(state): State<Arc<GatewayState<P>>>,
    Path(id): Path<String>,
    Json(payload): Json<EventPayload>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&payload)?;
    let provider = state.calendar()?;
    let event = provider.update(&id, payload).await?;
    tracing::info!(event = %event.id, "calendar event updated");
    Ok(Json(json!({ "success": true, "event": event })))
}

/// `DELETE /calendar/events/{id}` — deletes an event.
pub async fn delete_event<P: CalendarProvider>(
    State(state): State<Arc<GatewayState<P>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = state.calendar()?;
    provider.delete(&id).await?;
    tracing::info!(event = %id, "calendar event deleted");
    Ok(Json(json!({ "success": true, "deleted": id })))
}

/// Rejects payloads missing a required field before anything reaches the
/// provider.
fn validate(payload: &EventPayload) -> Result<(), ApiError> {
    if let Some(field) = payload.missing_field() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "missing_field",
            format!("missing required field: {field}"),
        ));
    }
    Ok(())
}
