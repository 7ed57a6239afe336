//! Integration tests for the WebSocket change stream against a live
//! in-process gateway.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use lexsync::config::EngineConfig;
use lexsync::remote::MemoryBackend;
use lexsync::repository::Repository;
use lexsync::stores::{DataStores, EMPLOYEES_QUERY};
use lexsync::sync::{ChangeStream, ChannelState, LoopbackHub, RealtimeBridge, WsStream};
use lexsync_gateway::calendar::MemoryCalendar;
use lexsync_gateway::server::{self, GatewayState};
use lexsync_proto::change::{ChangeEvent, RowData, Table};
use lexsync_proto::employee::{Employee, EmployeeId};

async fn start_gateway() -> (String, Arc<GatewayState<MemoryCalendar>>) {
    let state = Arc::new(GatewayState::new(None));
    let (addr, _handle) = server::start_server("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start gateway");
    (format!("ws://{addr}/realtime"), state)
}

fn employee_event(id: i64, first: &str) -> ChangeEvent {
    ChangeEvent::insert(
        Table::Employees,
        RowData::Employee(Employee {
            id: EmployeeId::new(id),
            first_name: first.to_string(),
            last_name: "Prueba".to_string(),
            active: true,
            role_id: None,
        }),
    )
}

#[tokio::test]
async fn subscribe_is_acknowledged_and_live() {
    let (url, _state) = start_gateway().await;
    let stream = WsStream::connect(&url).await.unwrap();
    let sub = stream.subscribe(Table::Employees).await.unwrap();
    assert_eq!(sub.channel_state(), ChannelState::Subscribed);
}

#[tokio::test]
async fn published_events_reach_subscribers_of_that_table_only() {
    let (url, _state) = start_gateway().await;

    let consumer = WsStream::connect(&url).await.unwrap();
    let mut employees = consumer.subscribe(Table::Employees).await.unwrap();
    let mut clients = consumer.subscribe(Table::Clients).await.unwrap();

    let producer = WsStream::connect(&url).await.unwrap();
    producer.publish(employee_event(1, "Ana")).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), employees.events.recv())
        .await
        .expect("event timed out")
        .unwrap();
    assert_eq!(event.table, Table::Employees);
    assert_eq!(event.row_id(), Some(1));
    assert!(clients.events.try_recv().is_err());
}

#[tokio::test]
async fn server_side_publish_reaches_ws_subscribers() {
    let (url, state) = start_gateway().await;

    let consumer = WsStream::connect(&url).await.unwrap();
    let mut employees = consumer.subscribe(Table::Employees).await.unwrap();

    // Give the subscription registration a moment to settle server-side.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let delivered = state.realtime.publish(&employee_event(2, "Luz")).await;
    assert_eq!(delivered, 1);

    let event = tokio::time::timeout(Duration::from_secs(5), employees.events.recv())
        .await
        .expect("event timed out")
        .unwrap();
    assert_eq!(event.row_id(), Some(2));
}

#[tokio::test]
async fn bridge_over_websocket_patches_flat_tables() {
    let (url, _state) = start_gateway().await;

    // The backend/hub pair is irrelevant here; reconciliation is driven by
    // gateway events arriving over the WebSocket stream.
    let hub = LoopbackHub::new();
    let backend = Arc::new(MemoryBackend::new(hub));
    let stores = DataStores::new(&EngineConfig::default());
    let repo = Arc::new(Repository::new(backend));

    let stream = WsStream::connect(&url).await.unwrap();
    let (bridge, _notices) = RealtimeBridge::new(
        stream,
        stores.clone(),
        repo,
        Duration::from_millis(50),
        16,
    );
    bridge.subscribe(Table::Employees).await.unwrap();
    stores.employees.set_query_data(EMPLOYEES_QUERY, |_| vec![]);

    let producer = WsStream::connect(&url).await.unwrap();
    producer.publish(employee_event(3, "Nora")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let roster = stores.employees.get(EMPLOYEES_QUERY).unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].first_name, "Nora");

    bridge.shutdown();
}

#[tokio::test]
async fn connect_to_closed_gateway_fails() {
    let result = WsStream::connect("ws://127.0.0.1:1/realtime").await;
    assert!(result.is_err());
}
