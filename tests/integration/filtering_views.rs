//! Integration tests for the task filtering engine.
//!
//! Exercises every board view against a shared office fixture, including
//! the documented boundary dates and the accent-insensitive search.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use chrono::{DateTime, NaiveDate};

use lexsync::filter::{FilterState, TaskView, filter_tasks, tasks_for_employee, unassigned_tasks};
use lexsync::model::{CaseSummary, TaskJoined};
use lexsync_proto::directory::CaseId;
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::{StateCategory, StateId, TaskState};
use lexsync_proto::task::{Importance, TaskId, TaskRecord, Urgency};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn employee(id: i64, first: &str, last: &str) -> Employee {
    Employee {
        id: EmployeeId::new(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
        active: true,
        role_id: None,
    }
}

fn state(id: i64, name: &str, category: StateCategory) -> TaskState {
    TaskState {
        id: StateId::new(id),
        name: name.to_string(),
        color: "#999".to_string(),
        category,
        position: 0,
        active: true,
    }
}

struct Office {
    maria: Employee,
    pedro: Employee,
    pendiente: TaskState,
    completada: TaskState,
    pausada: TaskState,
}

impl Office {
    fn new() -> Self {
        Self {
            maria: employee(1, "María", "García"),
            pedro: employee(2, "Pedro", "López"),
            pendiente: state(1, "Pendiente", StateCategory::Pendiente),
            completada: state(2, "Completada", StateCategory::Completado),
            pausada: state(3, "En pausa", StateCategory::EnProgreso),
        }
    }

    fn task(
        &self,
        id: i64,
        name: &str,
        task_state: &TaskState,
        due: Option<NaiveDate>,
        responsible: Vec<Employee>,
        designated: Vec<Employee>,
    ) -> TaskJoined {
        TaskJoined {
            record: TaskRecord {
                id: TaskId::new(id),
                name: name.to_string(),
                description: None,
                state_id: task_state.id,
                importance: Importance::Normal,
                urgency: Urgency::Normal,
                due_date: due,
                case_id: None,
                client_id: None,
                position: 0,
                created_at: DateTime::from_timestamp(0, 0).expect("valid timestamp"),
                completed_at: None,
            },
            state: task_state.clone(),
            case: None,
            client: None,
            responsible,
            designated,
        }
    }
}

fn names(filtered: &[&TaskJoined]) -> Vec<String> {
    filtered.iter().map(|t| t.record.name.clone()).collect()
}

// ---------------------------------------------------------------------------
// View scenarios
// ---------------------------------------------------------------------------

#[test]
fn mis_tareas_is_exactly_the_assigned_unfinished_subset() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "responsible",
            &office.pendiente,
            None,
            vec![office.maria.clone()],
            vec![],
        ),
        office.task(
            2,
            "designated",
            &office.pendiente,
            None,
            vec![],
            vec![office.maria.clone()],
        ),
        office.task(
            3,
            "completed and assigned",
            &office.completada,
            None,
            vec![office.maria.clone()],
            vec![],
        ),
        office.task(
            4,
            "pedro's",
            &office.pendiente,
            None,
            vec![office.pedro.clone()],
            vec![],
        ),
        office.task(5, "unassigned", &office.pendiente, None, vec![], vec![]),
    ];

    let filtered = filter_tasks(
        &tasks,
        TaskView::MisTareas,
        &FilterState::default(),
        Some(office.maria.id),
        today(),
    );
    assert_eq!(names(&filtered), vec!["responsible", "designated"]);
}

#[test]
fn retrasadas_boundary_around_today() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "due yesterday",
            &office.pendiente,
            Some(date(2024, 6, 9)),
            vec![],
            vec![],
        ),
        office.task(
            2,
            "due today",
            &office.pendiente,
            Some(date(2024, 6, 10)),
            vec![],
            vec![],
        ),
    ];

    let filtered = filter_tasks(
        &tasks,
        TaskView::Retrasadas,
        &FilterState::default(),
        None,
        today(),
    );
    assert_eq!(names(&filtered), vec!["due yesterday"]);
}

#[test]
fn proximos_5_dias_includes_day_five_excludes_day_six() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "exactly five days prior",
            &office.pendiente,
            Some(date(2024, 6, 5)),
            vec![],
            vec![],
        ),
        office.task(
            2,
            "six days prior",
            &office.pendiente,
            Some(date(2024, 6, 4)),
            vec![],
            vec![],
        ),
    ];

    let filtered = filter_tasks(
        &tasks,
        TaskView::Proximos5Dias,
        &FilterState::default(),
        None,
        today(),
    );
    assert_eq!(names(&filtered), vec!["exactly five days prior"]);
}

#[test]
fn search_maria_matches_accented_responsible() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "maria's task",
            &office.pendiente,
            None,
            vec![office.maria.clone()],
            vec![],
        ),
        office.task(
            2,
            "pedro's task",
            &office.pendiente,
            None,
            vec![office.pedro.clone()],
            vec![],
        ),
    ];

    let filter = FilterState {
        search: "maria".to_string(),
        ..FilterState::default()
    };
    let filtered = filter_tasks(&tasks, TaskView::Todas, &filter, None, today());
    assert_eq!(names(&filtered), vec!["maria's task"]);
}

#[test]
fn finalizadas_and_pausadas_bypass_the_generic_pipeline() {
    let office = Office::new();
    let tasks = vec![
        office.task(1, "open", &office.pendiente, None, vec![], vec![]),
        office.task(2, "done", &office.completada, None, vec![], vec![]),
        office.task(3, "paused", &office.pausada, None, vec![], vec![]),
    ];

    // A search term that matches nothing must not affect either view.
    let filter = FilterState {
        search: "zzz".to_string(),
        ..FilterState::default()
    };

    let done = filter_tasks(&tasks, TaskView::Finalizadas, &filter, None, today());
    assert_eq!(names(&done), vec!["done"]);

    let paused = filter_tasks(&tasks, TaskView::Pausadas, &filter, None, today());
    assert_eq!(names(&paused), vec!["paused"]);
}

#[test]
fn search_composes_with_view_predicate() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "escrito García",
            &office.pendiente,
            Some(date(2024, 6, 9)),
            vec![],
            vec![],
        ),
        office.task(
            2,
            "escrito Pérez",
            &office.pendiente,
            Some(date(2024, 6, 9)),
            vec![],
            vec![],
        ),
        office.task(
            3,
            "otro García",
            &office.pendiente,
            Some(date(2024, 6, 12)),
            vec![],
            vec![],
        ),
    ];

    let filter = FilterState {
        search: "garcía".to_string(),
        ..FilterState::default()
    };
    let filtered = filter_tasks(&tasks, TaskView::Retrasadas, &filter, None, today());
    assert_eq!(names(&filtered), vec!["escrito García"]);
}

#[test]
fn search_covers_linked_case_name() {
    let office = Office::new();
    let mut task = office.task(1, "audiencia", &office.pendiente, None, vec![], vec![]);
    task.case = Some(CaseSummary {
        id: CaseId::new(1),
        name: "Sucesión Núñez".to_string(),
    });
    let tasks = vec![task, office.task(2, "otra", &office.pendiente, None, vec![], vec![])];

    let filter = FilterState {
        search: "nunez".to_string(),
        ..FilterState::default()
    };
    let filtered = filter_tasks(&tasks, TaskView::Todas, &filter, None, today());
    assert_eq!(names(&filtered), vec!["audiencia"]);
}

#[test]
fn desempeno_groups_per_employee_from_the_filtered_set() {
    let office = Office::new();
    let tasks = vec![
        office.task(
            1,
            "maria resp",
            &office.pendiente,
            None,
            vec![office.maria.clone()],
            vec![],
        ),
        office.task(
            2,
            "maria desig",
            &office.pendiente,
            None,
            vec![office.pedro.clone()],
            vec![office.maria.clone()],
        ),
        office.task(3, "orphan", &office.pendiente, None, vec![], vec![]),
        office.task(
            4,
            "done",
            &office.completada,
            None,
            vec![office.maria.clone()],
            vec![],
        ),
    ];

    let filtered = filter_tasks(
        &tasks,
        TaskView::Desempeno,
        &FilterState::default(),
        None,
        today(),
    );

    let maria_tasks = tasks_for_employee(&filtered, office.maria.id);
    assert_eq!(names(&maria_tasks), vec!["maria resp", "maria desig"]);

    let orphans = unassigned_tasks(&filtered);
    assert_eq!(names(&orphans), vec!["orphan"]);
}
