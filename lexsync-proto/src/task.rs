//! Task records and assignment join rows.
//!
//! A [`TaskRecord`] is the flat row as stored by the backend: it references
//! its state, case, and client by id. Assignment to employees lives in join
//! rows ([`TaskAssignment`]), one table per assignment role (responsible,
//! designated). The relationally-joined shape consumed by views is built by
//! the engine's repository, not here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{CaseId, ClientId};
use crate::state::StateId;

/// Unique identifier for a task row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TaskId(i64);

impl TaskId {
    /// Wraps a raw row identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw row identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Importance axis of a task's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Ordinary importance.
    #[default]
    Normal,
    /// Flagged as important.
    Important,
}

/// Urgency axis of a task's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Ordinary urgency.
    #[default]
    Normal,
    /// Flagged as urgent.
    Urgent,
}

/// A task row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Row identifier.
    pub id: TaskId,
    /// Short task name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Reference to the task's state catalog entry.
    pub state_id: StateId,
    /// Importance axis.
    pub importance: Importance,
    /// Urgency axis.
    pub urgency: Urgency,
    /// Optional due date (date only; views normalize to midnight).
    pub due_date: Option<NaiveDate>,
    /// Optional linked legal case (proceso).
    pub case_id: Option<CaseId>,
    /// Optional linked client.
    pub client_id: Option<ClientId>,
    /// Manual sort order within a board column.
    pub position: i32,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the task was completed, if it has been.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Which assignment role a join row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentRole {
    /// The employee carries the task.
    Responsible,
    /// The employee is designated to assist.
    Designated,
}

/// A task/employee join row from one of the two assignment tables.
///
/// The ordering of join rows (by `position`) preserves the ordered
/// assignment lists on the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    /// Row identifier.
    pub id: i64,
    /// The task being assigned.
    pub task_id: TaskId,
    /// The assigned employee.
    pub employee_id: crate::employee::EmployeeId,
    /// Order of this employee within the task's assignment list.
    pub position: i32,
}
