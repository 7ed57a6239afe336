//! End-to-end scenario: backend mutations flow through the realtime
//! bridge into the query caches and out through the filtering engine.
//!
//! Create a pending task due yesterday with a responsible employee; it
//! must show up as overdue for any viewer and stay out of the finished
//! view. Flip its state to a completed category; the views must swap.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};

use lexsync::config::EngineConfig;
use lexsync::engine::SyncEngine;
use lexsync::filter::{FilterState, TaskView};
use lexsync::remote::{MemoryBackend, RemoteDataClient};
use lexsync::sync::LoopbackHub;
use lexsync_proto::change::{RowData, Table};
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::{StateCategory, StateId, TaskState};
use lexsync_proto::task::{Importance, TaskAssignment, TaskId, TaskRecord, Urgency};

fn state_row(name: &str, category: StateCategory) -> RowData {
    RowData::TaskState(TaskState {
        id: StateId::new(0),
        name: name.to_string(),
        color: "#999".to_string(),
        category,
        position: 0,
        active: true,
    })
}

async fn settle() {
    // Generously past the 100ms relational debounce.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn overdue_task_lifecycle_across_views() {
    let hub = LoopbackHub::new();
    let backend = Arc::new(MemoryBackend::new(hub.clone()));

    // Catalog setup: a pending state and a completed state.
    let pendiente = backend
        .insert(Table::TaskStates, state_row("Pendiente", StateCategory::Pendiente))
        .await
        .unwrap();
    let completada = backend
        .insert(
            Table::TaskStates,
            state_row("Completada", StateCategory::Completado),
        )
        .await
        .unwrap();

    // The responsible employee.
    let eva = backend
        .insert(
            Table::Employees,
            RowData::Employee(Employee {
                id: EmployeeId::new(0),
                first_name: "Eva".to_string(),
                last_name: "Roca".to_string(),
                active: true,
                role_id: None,
            }),
        )
        .await
        .unwrap();

    let (engine, _notices) =
        SyncEngine::initialize(EngineConfig::default(), Arc::clone(&backend), hub)
            .await
            .unwrap();
    engine.refresh_all().await.unwrap();

    // Create the task: pending, due yesterday, responsible Eva.
    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap();
    let task_record = TaskRecord {
        id: TaskId::new(0),
        name: "Presentar escrito".to_string(),
        description: None,
        state_id: StateId::new(pendiente.id()),
        importance: Importance::Important,
        urgency: Urgency::Urgent,
        due_date: Some(yesterday),
        case_id: None,
        client_id: None,
        position: 0,
        created_at: Utc::now(),
        completed_at: None,
    };
    let task = backend
        .insert(Table::Tasks, RowData::Task(task_record.clone()))
        .await
        .unwrap();
    backend
        .insert(
            Table::TaskResponsible,
            RowData::Assignment(TaskAssignment {
                id: 0,
                task_id: TaskId::new(task.id()),
                employee_id: EmployeeId::new(eva.id()),
                position: 0,
            }),
        )
        .await
        .unwrap();
    settle().await;

    // Overdue for any viewer, absent from the finished view.
    let overdue = engine.filtered_tasks(
        TaskView::Retrasadas,
        &FilterState::default(),
        Some(EmployeeId::new(999)),
        today,
    );
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].record.name, "Presentar escrito");
    assert_eq!(overdue[0].responsible[0].id, EmployeeId::new(eva.id()));

    let finished = engine.filtered_tasks(TaskView::Finalizadas, &FilterState::default(), None, today);
    assert!(finished.is_empty());

    // Eva sees it under mis-tareas; a stranger does not.
    let mine = engine.filtered_tasks(
        TaskView::MisTareas,
        &FilterState::default(),
        Some(EmployeeId::new(eva.id())),
        today,
    );
    assert_eq!(mine.len(), 1);
    let theirs = engine.filtered_tasks(
        TaskView::MisTareas,
        &FilterState::default(),
        Some(EmployeeId::new(999)),
        today,
    );
    assert!(theirs.is_empty());

    // Mark the task completed (server-side state change).
    let mut completed_record = task_record;
    completed_record.state_id = StateId::new(completada.id());
    completed_record.completed_at = Some(Utc::now());
    backend
        .update(Table::Tasks, task.id(), RowData::Task(completed_record))
        .await
        .unwrap();
    settle().await;

    // The views swap.
    let finished = engine.filtered_tasks(TaskView::Finalizadas, &FilterState::default(), None, today);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].record.name, "Presentar escrito");

    let overdue = engine.filtered_tasks(TaskView::Retrasadas, &FilterState::default(), None, today);
    assert!(overdue.is_empty());

    engine.shutdown();
}

#[tokio::test]
async fn notes_are_scoped_per_case_and_patched_live() {
    use lexsync_proto::directory::{CaseId, CaseRecord, NoteRecord};

    let hub = LoopbackHub::new();
    let backend = Arc::new(MemoryBackend::new(hub.clone()));

    let case = backend
        .insert(
            Table::Cases,
            RowData::Case(CaseRecord {
                id: CaseId::new(0),
                name: "García c/ Estado".to_string(),
                client_id: None,
                active: true,
            }),
        )
        .await
        .unwrap();

    let (engine, _notices) =
        SyncEngine::initialize(EngineConfig::default(), Arc::clone(&backend), hub)
            .await
            .unwrap();

    let case_id = CaseId::new(case.id());
    let notes = engine.notes(case_id).await.unwrap();
    assert!(notes.is_empty());

    // A new note arrives as a flat change event and is patched in place.
    backend
        .insert(
            Table::Notes,
            RowData::Note(NoteRecord {
                id: lexsync_proto::directory::NoteId::new(0),
                case_id,
                body: "Audiencia fijada".to_string(),
                created_at: Utc::now(),
            }),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let notes = engine
        .stores()
        .notes
        .get(lexsync::stores::notes_query(case_id))
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].body, "Audiencia fijada");

    engine.shutdown();
}
