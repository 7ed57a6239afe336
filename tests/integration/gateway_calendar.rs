//! Integration tests for the calendar REST proxy.
//!
//! Drives the JSON endpoints over real HTTP against an in-process gateway
//! backed by the in-memory calendar provider.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use serde_json::{Value, json};

use lexsync_gateway::calendar::MemoryCalendar;
use lexsync_gateway::server::{self, GatewayState};

async fn start_gateway(
    calendar: Option<MemoryCalendar>,
) -> (String, Arc<GatewayState<MemoryCalendar>>) {
    let state = Arc::new(GatewayState::new(calendar));
    let (addr, _handle) = server::start_server("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start gateway");
    (format!("http://{addr}"), state)
}

fn event_body(title: &str, task_id: Option<i64>) -> Value {
    json!({
        "title": title,
        "start": "2024-06-10T09:00:00-03:00",
        "end": "2024-06-10T10:00:00-03:00",
        "task_id": task_id,
    })
}

#[tokio::test]
async fn create_and_list_round_trip() {
    let (base, _state) = start_gateway(Some(MemoryCalendar::new())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/calendar/events"))
        .json(&event_body("Audiencia preliminar", None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["updated"], json!(false));
    assert_eq!(body["event"]["title"], json!("Audiencia preliminar"));

    let response = http
        .get(format!("{base}/calendar/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_required_field_is_rejected_with_400() {
    let (base, _state) = start_gateway(Some(MemoryCalendar::new())).await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{base}/calendar/events"))
        .json(&json!({ "title": "Sin fechas" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("missing_field"));
    assert!(body["details"].as_str().unwrap().contains("start"));
}

#[tokio::test]
async fn unconfigured_calendar_is_a_500_config_error() {
    let (base, _state) = start_gateway(None).await;
    let http = reqwest::Client::new();

    let response = http
        .get(format!("{base}/calendar/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("calendar_not_configured"));

    // Distinct from a provider failure: valid payload, same config error.
    let response = http
        .post(format!("{base}/calendar/events"))
        .json(&event_body("Audiencia", None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
}

#[tokio::test]
async fn duplicate_event_for_task_updates_in_place() {
    let (base, _state) = start_gateway(Some(MemoryCalendar::new())).await;
    let http = reqwest::Client::new();

    let first: Value = http
        .post(format!("{base}/calendar/events"))
        .json(&event_body("Original", Some(7)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["updated"], json!(false));
    let first_id = first["event"]["id"].as_str().unwrap().to_string();

    // Same linked task: the proxy falls back to updating the existing
    // event instead of failing.
    let second = http
        .post(format!("{base}/calendar/events"))
        .json(&event_body("Reprogramada", Some(7)))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 200);
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["updated"], json!(true));
    assert_eq!(second["event"]["id"], json!(first_id));
    assert_eq!(second["event"]["title"], json!("Reprogramada"));

    // Still exactly one event on the calendar.
    let listed: Value = http
        .get(format!("{base}/calendar/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let (base, _state) = start_gateway(Some(MemoryCalendar::new())).await;
    let http = reqwest::Client::new();

    let created: Value = http
        .post(format!("{base}/calendar/events"))
        .json(&event_body("Audiencia", None))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["event"]["id"].as_str().unwrap().to_string();

    let response = http
        .put(format!("{base}/calendar/events/{id}"))
        .json(&event_body("Audiencia (sala 3)", None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["event"]["title"], json!("Audiencia (sala 3)"));

    let response = http
        .delete(format!("{base}/calendar/events/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], json!(id));

    let listed: Value = http
        .get(format!("{base}/calendar/events"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn operations_on_unknown_events_are_404() {
    let (base, _state) = start_gateway(Some(MemoryCalendar::new())).await;
    let http = reqwest::Client::new();

    let response = http
        .put(format!("{base}/calendar/events/evt-99"))
        .json(&event_body("Fantasma", None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("provider_error"));

    let response = http
        .delete(format!("{base}/calendar/events/evt-99"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
