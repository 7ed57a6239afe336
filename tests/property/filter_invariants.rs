//! Property-based tests for the task filtering engine.
//!
//! Uses proptest to verify structural invariants that must hold for any
//! task collection and filter state:
//! 1. Every view's result is a subset of its input.
//! 2. Finished tasks never escape the non-finished views.
//! 3. The finished view contains only finished tasks.
//! 4. Grouping helpers partition consistently (no overlap between the
//!    unassigned group and any per-employee group).
//! 5. Arbitrary search input never panics and only narrows the result.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Days, NaiveDate};
use proptest::prelude::*;

use lexsync::filter::{
    FilterState, TaskView, filter_tasks, tasks_for_employee, unassigned_tasks,
};
use lexsync::model::TaskJoined;
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::{StateCategory, StateId, TaskState};
use lexsync_proto::task::{Importance, TaskId, TaskRecord, Urgency};

// --- Strategy builders ---

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date")
}

fn employee(id: i64) -> Employee {
    Employee {
        id: EmployeeId::new(id),
        first_name: format!("Nombre{id}"),
        last_name: format!("Apellido{id}"),
        active: true,
        role_id: None,
    }
}

/// Strategy for a state drawn from a small realistic catalog.
fn arb_state() -> impl Strategy<Value = TaskState> {
    prop_oneof![
        Just((1, "Pendiente", StateCategory::Pendiente)),
        Just((2, "En progreso", StateCategory::EnProgreso)),
        Just((3, "En pausa", StateCategory::EnProgreso)),
        Just((4, "Completada", StateCategory::Completado)),
    ]
    .prop_map(|(id, name, category)| TaskState {
        id: StateId::new(id),
        name: name.to_string(),
        color: "#999".to_string(),
        category,
        position: 0,
        active: true,
    })
}

/// Strategy for assignment lists over a roster of four employees.
fn arb_assignees() -> impl Strategy<Value = Vec<Employee>> {
    proptest::collection::vec(1..=4i64, 0..3)
        .prop_map(|ids| ids.into_iter().map(employee).collect())
}

/// Strategy for one joined task.
fn arb_task(id: i64) -> impl Strategy<Value = TaskJoined> {
    (
        arb_state(),
        proptest::option::of(-10..=10i64),
        arb_assignees(),
        arb_assignees(),
        prop_oneof![Just(Importance::Normal), Just(Importance::Important)],
        prop_oneof![Just(Urgency::Normal), Just(Urgency::Urgent)],
    )
        .prop_map(
            move |(state, due_offset, responsible, designated, importance, urgency)| {
                let due_date = due_offset.map(|offset| {
                    let base = today();
                    if offset >= 0 {
                        base.checked_add_days(Days::new(offset.unsigned_abs()))
                            .expect("valid date")
                    } else {
                        base.checked_sub_days(Days::new(offset.unsigned_abs()))
                            .expect("valid date")
                    }
                });
                TaskJoined {
                    record: TaskRecord {
                        id: TaskId::new(id),
                        name: format!("Tarea {id}"),
                        description: None,
                        state_id: state.id,
                        importance,
                        urgency,
                        due_date,
                        case_id: None,
                        client_id: None,
                        position: 0,
                        created_at: DateTime::from_timestamp(0, 0).expect("valid timestamp"),
                        completed_at: None,
                    },
                    state,
                    case: None,
                    client: None,
                    responsible,
                    designated,
                }
            },
        )
}

/// Strategy for a task collection with distinct ids.
fn arb_tasks() -> impl Strategy<Value = Vec<TaskJoined>> {
    proptest::collection::vec(proptest::bool::ANY, 0..12).prop_flat_map(|slots| {
        let strategies: Vec<_> = slots
            .iter()
            .enumerate()
            .map(|(i, _)| arb_task(i64::try_from(i).expect("small index") + 1))
            .collect();
        strategies
    })
}

/// Strategy for any view.
fn arb_view() -> impl Strategy<Value = TaskView> {
    prop_oneof![
        Just(TaskView::MisTareas),
        Just(TaskView::Todas),
        Just(TaskView::Proximos5Dias),
        Just(TaskView::Retrasadas),
        Just(TaskView::Pausadas),
        Just(TaskView::Finalizadas),
        Just(TaskView::Desempeno),
    ]
}

fn ids(tasks: &[&TaskJoined]) -> Vec<TaskId> {
    tasks.iter().map(|t| t.record.id).collect()
}

// --- Properties ---

proptest! {
    #[test]
    fn filtered_result_is_a_subset_of_input(
        tasks in arb_tasks(),
        view in arb_view(),
        viewer in proptest::option::of(1..=5i64),
    ) {
        let filtered = filter_tasks(
            &tasks,
            view,
            &FilterState::default(),
            viewer.map(EmployeeId::new),
            today(),
        );
        let input_ids: Vec<TaskId> = tasks.iter().map(|t| t.record.id).collect();
        for id in ids(&filtered) {
            prop_assert!(input_ids.contains(&id));
        }
        prop_assert!(filtered.len() <= tasks.len());
    }

    #[test]
    fn finished_tasks_never_escape_working_views(
        tasks in arb_tasks(),
        viewer in proptest::option::of(1..=5i64),
    ) {
        for view in [
            TaskView::MisTareas,
            TaskView::Todas,
            TaskView::Proximos5Dias,
            TaskView::Retrasadas,
            TaskView::Desempeno,
        ] {
            let filtered = filter_tasks(
                &tasks,
                view,
                &FilterState::default(),
                viewer.map(EmployeeId::new),
                today(),
            );
            for task in &filtered {
                prop_assert!(
                    !task.is_finished(),
                    "finished task leaked into {view}",
                );
            }
        }
    }

    #[test]
    fn finished_view_contains_only_finished_tasks(tasks in arb_tasks()) {
        let filtered = filter_tasks(
            &tasks,
            TaskView::Finalizadas,
            &FilterState::default(),
            None,
            today(),
        );
        let finished_count = tasks.iter().filter(|t| t.is_finished()).count();
        prop_assert_eq!(filtered.len(), finished_count);
        for task in &filtered {
            prop_assert!(task.is_finished());
        }
    }

    #[test]
    fn unassigned_group_never_overlaps_employee_groups(
        tasks in arb_tasks(),
        view in arb_view(),
    ) {
        let filtered = filter_tasks(&tasks, view, &FilterState::default(), None, today());
        let orphan_ids = ids(&unassigned_tasks(&filtered));
        for employee_id in 1..=4i64 {
            let group = tasks_for_employee(&filtered, EmployeeId::new(employee_id));
            for id in ids(&group) {
                prop_assert!(!orphan_ids.contains(&id));
            }
        }
        // Every filtered task is either unassigned or in some employee group.
        for task in &filtered {
            let grouped = (1..=4i64)
                .any(|e| task.is_assigned_to(EmployeeId::new(e)));
            prop_assert_eq!(grouped, !orphan_ids.contains(&task.record.id));
        }
    }

    #[test]
    fn arbitrary_search_only_narrows(
        tasks in arb_tasks(),
        search in ".{0,32}",
    ) {
        let unfiltered = filter_tasks(
            &tasks,
            TaskView::Todas,
            &FilterState::default(),
            None,
            today(),
        );
        let filter = FilterState { search, ..FilterState::default() };
        let narrowed = filter_tasks(&tasks, TaskView::Todas, &filter, None, today());

        prop_assert!(narrowed.len() <= unfiltered.len());
        let unfiltered_ids = ids(&unfiltered);
        for id in ids(&narrowed) {
            prop_assert!(unfiltered_ids.contains(&id));
        }
    }
}
