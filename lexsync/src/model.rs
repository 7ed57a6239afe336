//! Normalized joined shapes served to views.
//!
//! The repository assembles these at the data-loading boundary. Every
//! consumer sees exactly one shape: assignment lists are materialized
//! [`Employee`] values and identity checks are plain typed-id equality.
//! A divergent join shape cannot be represented here, which is the point —
//! shape drift is a loader bug, not something to branch around downstream.

use lexsync_proto::directory::{CaseId, ClientId};
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::TaskState;
use lexsync_proto::task::TaskRecord;

/// Minimal case projection carried on a joined task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSummary {
    /// Case row identifier.
    pub id: CaseId,
    /// Case display name.
    pub name: String,
}

/// Minimal client projection carried on a joined task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSummary {
    /// Client row identifier.
    pub id: ClientId,
    /// Client display name.
    pub name: String,
}

/// A task with its relations resolved: state, case, client, and both
/// ordered assignment lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskJoined {
    /// The flat task row.
    pub record: TaskRecord,
    /// The resolved state catalog entry.
    pub state: TaskState,
    /// The linked case, if any.
    pub case: Option<CaseSummary>,
    /// The linked client, if any.
    pub client: Option<ClientSummary>,
    /// Employees carrying the task, in assignment order.
    pub responsible: Vec<Employee>,
    /// Employees designated to assist, in assignment order.
    pub designated: Vec<Employee>,
}

impl TaskJoined {
    /// Whether the task's state category marks it finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Whether the given employee appears in either assignment list.
    #[must_use]
    pub fn is_assigned_to(&self, employee: EmployeeId) -> bool {
        self.responsible.iter().any(|e| e.id == employee)
            || self.designated.iter().any(|e| e.id == employee)
    }

    /// Whether any employee is assigned in either role.
    #[must_use]
    pub fn has_assignees(&self) -> bool {
        !self.responsible.is_empty() || !self.designated.is_empty()
    }
}
