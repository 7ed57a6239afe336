//! The data-loading boundary.
//!
//! `Repository` is the only place that talks to the remote data client and
//! the only place that assembles joined shapes. Everything downstream
//! consumes the normalized [`TaskJoined`] model; a row that does not match
//! its table's shape is an error here, not a branch somewhere else.

use std::collections::HashMap;
use std::sync::Arc;

use lexsync_proto::change::{RowData, Table};
use lexsync_proto::directory::{CaseId, CaseRecord, Client, ClientId, NoteRecord};
use lexsync_proto::employee::{Employee, EmployeeId};
use lexsync_proto::state::{StateId, TaskState};
use lexsync_proto::task::{TaskAssignment, TaskId, TaskRecord};

use crate::cache::TtlCache;
use crate::model::{CaseSummary, ClientSummary, TaskJoined};
use crate::remote::{OrderBy, RemoteDataClient, RemoteError, SelectFilter};

/// Read-side repository over a remote data client.
///
/// The auxiliary TTL cache memoizes the resolved ordering column per table
/// so a missing manual sort column is not re-discovered on every fetch.
pub struct Repository<B> {
    backend: Arc<B>,
    aux: TtlCache<OrderBy>,
}

impl<B: RemoteDataClient> Repository<B> {
    /// Creates a repository over the given backend.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            aux: TtlCache::new(),
        }
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Forgets memoized auxiliary state for one table family.
    pub fn invalidate_aux(&self, table: Table) {
        self.aux.invalidate_pattern(table.wire_name());
    }

    /// Loads every task with its relations resolved, in board order.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when any underlying select fails or returns
    /// rows of the wrong shape.
    pub async fn load_tasks(&self) -> Result<Vec<TaskJoined>, RemoteError> {
        let task_rows = self.select_ordered_with_fallback(Table::Tasks).await?;
        let tasks = unwrap_rows(task_rows, Table::Tasks, |row| match row {
            RowData::Task(r) => Some(r),
            _ => None,
        })?;

        let states = self.load_states().await?;
        let employees = self.load_employees().await?;
        let cases = self.load_cases().await?;
        let clients = self.load_clients().await?;
        let responsible = self.load_assignments(Table::TaskResponsible).await?;
        let designated = self.load_assignments(Table::TaskDesignated).await?;

        let state_by_id: HashMap<StateId, TaskState> =
            states.into_iter().map(|s| (s.id, s)).collect();
        let employee_by_id: HashMap<EmployeeId, Employee> =
            employees.into_iter().map(|e| (e.id, e)).collect();
        let case_by_id: HashMap<CaseId, CaseRecord> =
            cases.into_iter().map(|c| (c.id, c)).collect();
        let client_by_id: HashMap<ClientId, Client> =
            clients.into_iter().map(|c| (c.id, c)).collect();

        let responsible_by_task = group_assignments(responsible);
        let designated_by_task = group_assignments(designated);

        let mut joined = Vec::with_capacity(tasks.len());
        for record in tasks {
            let Some(state) = state_by_id.get(&record.state_id).cloned() else {
                tracing::warn!(
                    task = %record.id,
                    state = %record.state_id,
                    "task references unknown state, skipping"
                );
                continue;
            };
            let case = record
                .case_id
                .and_then(|id| case_by_id.get(&id))
                .map(|c| CaseSummary {
                    id: c.id,
                    name: c.name.clone(),
                });
            let client = record
                .client_id
                .and_then(|id| client_by_id.get(&id))
                .map(|c| ClientSummary {
                    id: c.id,
                    name: c.name.clone(),
                });
            let responsible = resolve_assignees(&responsible_by_task, record.id, &employee_by_id);
            let designated = resolve_assignees(&designated_by_task, record.id, &employee_by_id);

            joined.push(TaskJoined {
                record,
                state,
                case,
                client,
                responsible,
                designated,
            });
        }
        Ok(joined)
    }

    /// Loads the employee roster.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on select failure or wrong row shape.
    pub async fn load_employees(&self) -> Result<Vec<Employee>, RemoteError> {
        let rows = self
            .backend
            .select(Table::Employees, SelectFilter::All, None)
            .await?;
        unwrap_rows(rows, Table::Employees, |row| match row {
            RowData::Employee(e) => Some(e),
            _ => None,
        })
    }

    /// Loads the task state catalog in display order.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on select failure or wrong row shape.
    pub async fn load_states(&self) -> Result<Vec<TaskState>, RemoteError> {
        let rows = self
            .backend
            .select(Table::TaskStates, SelectFilter::All, Some(OrderBy::Position))
            .await?;
        unwrap_rows(rows, Table::TaskStates, |row| match row {
            RowData::TaskState(s) => Some(s),
            _ => None,
        })
    }

    /// Loads the client directory.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on select failure or wrong row shape.
    pub async fn load_clients(&self) -> Result<Vec<Client>, RemoteError> {
        let rows = self
            .backend
            .select(Table::Clients, SelectFilter::All, None)
            .await?;
        unwrap_rows(rows, Table::Clients, |row| match row {
            RowData::Client(c) => Some(c),
            _ => None,
        })
    }

    /// Loads every legal case.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on select failure or wrong row shape.
    pub async fn load_cases(&self) -> Result<Vec<CaseRecord>, RemoteError> {
        let rows = self
            .backend
            .select(Table::Cases, SelectFilter::All, None)
            .await?;
        unwrap_rows(rows, Table::Cases, |row| match row {
            RowData::Case(c) => Some(c),
            _ => None,
        })
    }

    /// Loads the notes of one case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on select failure or wrong row shape.
    pub async fn load_notes(&self, case_id: CaseId) -> Result<Vec<NoteRecord>, RemoteError> {
        let rows = self
            .backend
            .select(
                Table::Notes,
                SelectFilter::CaseScoped(case_id),
                Some(OrderBy::CreatedAt),
            )
            .await?;
        unwrap_rows(rows, Table::Notes, |row| match row {
            RowData::Note(n) => Some(n),
            _ => None,
        })
    }

    /// Loads one assignment join table.
    async fn load_assignments(&self, table: Table) -> Result<Vec<TaskAssignment>, RemoteError> {
        let rows = self.backend.select(table, SelectFilter::All, None).await?;
        unwrap_rows(rows, table, |row| match row {
            RowData::Assignment(a) => Some(a),
            _ => None,
        })
    }

    /// Selects a table ordered by the manual sort column, falling back to
    /// creation timestamp when the column does not exist in the deployed
    /// schema. The resolved column is memoized so the failing order is not
    /// retried on every fetch.
    async fn select_ordered_with_fallback(&self, table: Table) -> Result<Vec<RowData>, RemoteError> {
        let key = format!("{}:order_column", table.wire_name());
        let order = self.aux.get(&key).unwrap_or(OrderBy::Position);

        match self
            .backend
            .select(table, SelectFilter::All, Some(order))
            .await
        {
            Ok(rows) => {
                self.aux.set(key, order);
                Ok(rows)
            }
            Err(e) if order == OrderBy::Position && e.is_undefined_column() => {
                tracing::warn!(
                    table = %table,
                    "manual sort column missing, ordering by creation date"
                );
                let rows = self
                    .backend
                    .select(table, SelectFilter::All, Some(OrderBy::CreatedAt))
                    .await?;
                self.aux.set(key, OrderBy::CreatedAt);
                Ok(rows)
            }
            Err(e) => Err(e),
        }
    }
}

/// Unwraps a row vector into its typed form, rejecting wrong shapes.
fn unwrap_rows<T>(
    rows: Vec<RowData>,
    table: Table,
    extract: impl Fn(RowData) -> Option<T>,
) -> Result<Vec<T>, RemoteError> {
    rows.into_iter()
        .map(|row| extract(row).ok_or(RemoteError::UnexpectedRow { table }))
        .collect()
}

/// Groups join rows by task, each list ordered by the join position.
fn group_assignments(rows: Vec<TaskAssignment>) -> HashMap<TaskId, Vec<TaskAssignment>> {
    let mut grouped: HashMap<TaskId, Vec<TaskAssignment>> = HashMap::new();
    for row in rows {
        grouped.entry(row.task_id).or_default().push(row);
    }
    for list in grouped.values_mut() {
        list.sort_by_key(|a| a.position);
    }
    grouped
}

/// Materializes one task's assignment list into employees.
fn resolve_assignees(
    grouped: &HashMap<TaskId, Vec<TaskAssignment>>,
    task: TaskId,
    employees: &HashMap<EmployeeId, Employee>,
) -> Vec<Employee> {
    grouped
        .get(&task)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let found = employees.get(&row.employee_id).cloned();
                    if found.is_none() {
                        tracing::warn!(
                            task = %task,
                            employee = %row.employee_id,
                            "assignment references unknown employee, skipping"
                        );
                    }
                    found
                })
                .collect()
        })
        .unwrap_or_default()
}
