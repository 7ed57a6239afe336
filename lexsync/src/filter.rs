//! The task filtering engine.
//!
//! A pure function of (joined task collection, view, filter state, viewer
//! identity, today): no I/O, no fetches, no hidden state. Grouping helpers
//! derive per-employee views from an already-filtered set.
//!
//! Search is case- and accent-insensitive: "maria" matches "María". The
//! backing data is Spanish, so the fold covers the Spanish diacritics.

use chrono::{Days, NaiveDate};

use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::StateId;
use lexsync_proto::task::{Importance, Urgency};

use crate::model::TaskJoined;

/// UI sentinel that disables a categorical filter.
pub const FILTER_ALL: &str = "todos";

/// The board views, named as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskView {
    /// Tasks the viewer is responsible for or designated on.
    MisTareas,
    /// Every unfinished task.
    #[default]
    Todas,
    /// Tasks due within the last five days (inclusive window ending today).
    Proximos5Dias,
    /// Tasks past their due date and not finished.
    Retrasadas,
    /// Tasks in a paused state (matched by state name).
    Pausadas,
    /// Finished tasks only.
    Finalizadas,
    /// Performance view: the full unfinished set, grouped per employee.
    Desempeno,
}

impl TaskView {
    /// The view's wire name.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::MisTareas => "mis-tareas",
            Self::Todas => "todas",
            Self::Proximos5Dias => "proximos-5-dias",
            Self::Retrasadas => "retrasadas",
            Self::Pausadas => "pausadas",
            Self::Finalizadas => "finalizadas",
            Self::Desempeno => "desempeno",
        }
    }

    /// Parses a wire name back into a view.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "mis-tareas" => Some(Self::MisTareas),
            "todas" => Some(Self::Todas),
            "proximos-5-dias" => Some(Self::Proximos5Dias),
            "retrasadas" => Some(Self::Retrasadas),
            "pausadas" => Some(Self::Pausadas),
            "finalizadas" => Some(Self::Finalizadas),
            "desempeno" => Some(Self::Desempeno),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Active categorical filters and search term. `None` disables an axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Free-text search over task name, case name, and responsible names.
    pub search: String,
    /// Restrict to one task state.
    pub state: Option<StateId>,
    /// Restrict to one importance level.
    pub importance: Option<Importance>,
    /// Restrict to one urgency level.
    pub urgency: Option<Urgency>,
}

impl FilterState {
    /// Builds the state filter from a UI selection; the [`FILTER_ALL`]
    /// sentinel (or anything unparseable) disables it.
    #[must_use]
    pub fn state_selection(value: &str) -> Option<StateId> {
        if value == FILTER_ALL {
            return None;
        }
        value.parse::<i64>().ok().map(StateId::new)
    }

    /// Builds the importance filter from a UI selection.
    #[must_use]
    pub fn importance_selection(value: &str) -> Option<Importance> {
        match value {
            "important" => Some(Importance::Important),
            "normal" => Some(Importance::Normal),
            _ => None,
        }
    }

    /// Builds the urgency filter from a UI selection.
    #[must_use]
    pub fn urgency_selection(value: &str) -> Option<Urgency> {
        match value {
            "urgent" => Some(Urgency::Urgent),
            "normal" => Some(Urgency::Normal),
            _ => None,
        }
    }
}

/// Computes the view-specific subset of the task collection.
///
/// `finalizadas` and `pausadas` bypass the generic pipeline and apply their
/// single predicate. Every other view excludes finished tasks, then applies
/// its own predicate, the search term, and the categorical filters, in that
/// order, short-circuiting per task. `mis-tareas` without a viewer yields
/// an empty result rather than an error.
#[must_use]
pub fn filter_tasks<'a>(
    tasks: &'a [TaskJoined],
    view: TaskView,
    filter: &FilterState,
    viewer: Option<EmployeeId>,
    today: NaiveDate,
) -> Vec<&'a TaskJoined> {
    match view {
        TaskView::Finalizadas => return tasks.iter().filter(|t| t.is_finished()).collect(),
        TaskView::Pausadas => return tasks.iter().filter(|t| t.state.is_paused()).collect(),
        _ => {}
    }

    if view == TaskView::MisTareas && viewer.is_none() {
        return Vec::new();
    }

    tasks
        .iter()
        .filter(|task| {
            if task.is_finished() {
                return false;
            }
            match view {
                TaskView::MisTareas => {
                    let Some(viewer) = viewer else { return false };
                    if !task.is_assigned_to(viewer) {
                        return false;
                    }
                }
                TaskView::Proximos5Dias => {
                    let Some(due) = task.record.due_date else {
                        return false;
                    };
                    let Some(window_start) = today.checked_sub_days(Days::new(5)) else {
                        return false;
                    };
                    if due < window_start || due > today {
                        return false;
                    }
                }
                TaskView::Retrasadas => {
                    let Some(due) = task.record.due_date else {
                        return false;
                    };
                    if due >= today {
                        return false;
                    }
                }
                TaskView::Todas
                | TaskView::Desempeno
                | TaskView::Pausadas
                | TaskView::Finalizadas => {}
            }
            if !matches_search(task, &filter.search) {
                return false;
            }
            if let Some(state) = filter.state
                && task.record.state_id != state
            {
                return false;
            }
            if let Some(importance) = filter.importance
                && task.record.importance != importance
            {
                return false;
            }
            if let Some(urgency) = filter.urgency
                && task.record.urgency != urgency
            {
                return false;
            }
            true
        })
        .collect()
}

/// Tasks in the filtered set assigned to one employee (either role).
#[must_use]
pub fn tasks_for_employee<'a>(
    filtered: &[&'a TaskJoined],
    employee: EmployeeId,
) -> Vec<&'a TaskJoined> {
    filtered
        .iter()
        .filter(|t| t.is_assigned_to(employee))
        .copied()
        .collect()
}

/// Tasks in the filtered set with no assignee in either role.
#[must_use]
pub fn unassigned_tasks<'a>(filtered: &[&'a TaskJoined]) -> Vec<&'a TaskJoined> {
    filtered
        .iter()
        .filter(|t| !t.has_assignees())
        .copied()
        .collect()
}

/// Roster members with at least one task in the filtered set, in roster
/// order. Drives the collapsed/expanded grouped display.
#[must_use]
pub fn employees_with_tasks<'a>(
    filtered: &[&TaskJoined],
    roster: &'a [Employee],
) -> Vec<&'a Employee> {
    roster
        .iter()
        .filter(|employee| filtered.iter().any(|t| t.is_assigned_to(employee.id)))
        .collect()
}

/// Case- and accent-insensitive search over task name, case name, and
/// responsible employees' first/last names.
fn matches_search(task: &TaskJoined, term: &str) -> bool {
    let term = normalize(term);
    if term.is_empty() {
        return true;
    }
    if normalize(&task.record.name).contains(&term) {
        return true;
    }
    if let Some(case) = &task.case
        && normalize(&case.name).contains(&term)
    {
        return true;
    }
    task.responsible.iter().any(|e| {
        normalize(&e.first_name).contains(&term) || normalize(&e.last_name).contains(&term)
    })
}

/// Lowercases and folds Spanish diacritics for substring matching.
fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .collect()
}

const fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
