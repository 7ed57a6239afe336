//! The engine's typed query caches and their keys.
//!
//! One [`QueryCache`] per entity family, built from the staleness policy
//! table in [`EngineConfig`]. Flat-table change events are patched into
//! these caches here; relational tables go through invalidate + refetch in
//! the bridge instead.

use lexsync_proto::change::{ChangeEvent, ChangeOp, RowData, Table};
use lexsync_proto::directory::{CaseId, CaseRecord, Client, NoteRecord};
use lexsync_proto::employee::Employee;
use lexsync_proto::state::TaskState;

use crate::config::EngineConfig;
use crate::model::TaskJoined;
use crate::query::{QueryCache, QueryKey};

/// Key of the joined tasks query.
pub const TASKS_QUERY: QueryKey = QueryKey::root("tareas");
/// Key of the employee roster query.
pub const EMPLOYEES_QUERY: QueryKey = QueryKey::root("empleados");
/// Key of the task state catalog query.
pub const STATES_QUERY: QueryKey = QueryKey::root("tarea_estados");
/// Key of the client directory query.
pub const CLIENTS_QUERY: QueryKey = QueryKey::root("clientes");
/// Key of the legal cases query.
pub const CASES_QUERY: QueryKey = QueryKey::root("procesos");

/// Key of one case's notes query.
#[must_use]
pub const fn notes_query(case: CaseId) -> QueryKey {
    QueryKey::scoped("notas", case.get())
}

/// Every typed cache the engine serves views from.
#[derive(Clone)]
pub struct DataStores {
    /// Joined tasks (always stale; refetched on every access and on
    /// relational change events).
    pub tasks: QueryCache<Vec<TaskJoined>>,
    /// Employee roster.
    pub employees: QueryCache<Vec<Employee>>,
    /// Task state catalog.
    pub states: QueryCache<Vec<TaskState>>,
    /// Client directory.
    pub clients: QueryCache<Vec<Client>>,
    /// Legal cases.
    pub cases: QueryCache<Vec<CaseRecord>>,
    /// Per-case notes, keyed by [`notes_query`].
    pub notes: QueryCache<Vec<NoteRecord>>,
}

impl DataStores {
    /// Builds the caches from the policy table.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tasks: QueryCache::with_retry_delay(config.tasks, config.retry_delay),
            employees: QueryCache::with_retry_delay(config.employees, config.retry_delay),
            states: QueryCache::with_retry_delay(config.task_states, config.retry_delay),
            clients: QueryCache::with_retry_delay(config.clients, config.retry_delay),
            cases: QueryCache::with_retry_delay(config.cases, config.retry_delay),
            notes: QueryCache::with_retry_delay(config.notes, config.retry_delay),
        }
    }

    /// Applies a minimal patch for a flat-table change event.
    ///
    /// Insert prepends the new row, update replaces the matching row by
    /// identifier, delete removes it. Returns whether anything was patched;
    /// events for tables whose query has never been fetched are ignored
    /// (the first fetch will include the row anyway).
    pub fn apply_flat_patch(&self, event: &ChangeEvent) -> bool {
        match event.table {
            Table::Employees => patch_list(
                &self.employees,
                EMPLOYEES_QUERY,
                event,
                |row| match row {
                    RowData::Employee(e) => Some(e.clone()),
                    _ => None,
                },
                |e: &Employee| e.id.get(),
            ),
            Table::Clients => patch_list(
                &self.clients,
                CLIENTS_QUERY,
                event,
                |row| match row {
                    RowData::Client(c) => Some(c.clone()),
                    _ => None,
                },
                |c: &Client| c.id.get(),
            ),
            Table::TaskStates => patch_list(
                &self.states,
                STATES_QUERY,
                event,
                |row| match row {
                    RowData::TaskState(s) => Some(s.clone()),
                    _ => None,
                },
                |s: &TaskState| s.id.get(),
            ),
            Table::Notes => {
                let Some(case_id) = note_case(event) else {
                    return false;
                };
                patch_list(
                    &self.notes,
                    notes_query(case_id),
                    event,
                    |row| match row {
                        RowData::Note(n) => Some(n.clone()),
                        _ => None,
                    },
                    |n: &NoteRecord| n.id.get(),
                )
            }
            Table::Tasks | Table::Cases | Table::TaskResponsible | Table::TaskDesignated => false,
        }
    }
}

/// The case a note event belongs to, from whichever row image is present.
fn note_case(event: &ChangeEvent) -> Option<CaseId> {
    let row = event.new_row.as_ref().or(event.old_row.as_ref())?;
    match row {
        RowData::Note(n) => Some(n.case_id),
        _ => None,
    }
}

/// Patches one cached list from a change event.
fn patch_list<T: Clone + Send + Sync + 'static>(
    cache: &QueryCache<Vec<T>>,
    key: QueryKey,
    event: &ChangeEvent,
    extract: impl Fn(&RowData) -> Option<T>,
    id_of: impl Fn(&T) -> i64 + Copy,
) -> bool {
    if cache.get(key).is_none() {
        tracing::debug!(key = %key, "no cached snapshot to patch, ignoring event");
        return false;
    }
    match event.op {
        ChangeOp::Insert => {
            let Some(row) = event.new_row.as_ref().and_then(|r| extract(r)) else {
                return false;
            };
            cache.set_query_data(key, move |prev| {
                let mut next = Vec::with_capacity(prev.map_or(0, Vec::len) + 1);
                next.push(row);
                if let Some(prev) = prev {
                    next.extend(prev.iter().cloned());
                }
                next
            });
            true
        }
        ChangeOp::Update => {
            let Some(row) = event.new_row.as_ref().and_then(|r| extract(r)) else {
                return false;
            };
            let id = id_of(&row);
            cache.set_query_data(key, move |prev| {
                prev.map(|list| {
                    list.iter()
                        .map(|item| {
                            if id_of(item) == id {
                                row.clone()
                            } else {
                                item.clone()
                            }
                        })
                        .collect()
                })
                .unwrap_or_default()
            });
            true
        }
        ChangeOp::Delete => {
            let Some(id) = event.row_id() else {
                return false;
            };
            cache.set_query_data(key, move |prev| {
                prev.map(|list| {
                    list.iter()
                        .filter(|item| id_of(item) != id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
            });
            true
        }
    }
}
