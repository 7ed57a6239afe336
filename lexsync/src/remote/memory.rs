//! In-memory implementation of [`RemoteDataClient`].
//!
//! Behaves like the hosted platform for tests and offline development:
//! server-side id assignment, per-table row storage, and a change event
//! published to a [`LoopbackHub`] for every committed mutation. A table can
//! be marked as missing the manual sort column to exercise the repository's
//! ordering fallback.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use lexsync_proto::change::{ChangeEvent, RowData, Table};
use lexsync_proto::directory::{CaseId, ClientId, NoteId};
use lexsync_proto::employee::EmployeeId;
use lexsync_proto::state::StateId;
use lexsync_proto::task::TaskId;

use super::{OrderBy, RemoteDataClient, RemoteError, SelectFilter};
use crate::sync::stream::LoopbackHub;

/// In-memory table store publishing change events on every mutation.
pub struct MemoryBackend {
    tables: Mutex<HashMap<Table, Vec<RowData>>>,
    next_id: AtomicI64,
    hub: LoopbackHub,
    missing_sort_column: Mutex<HashSet<Table>>,
}

impl MemoryBackend {
    /// Creates an empty backend that publishes change events to `hub`.
    #[must_use]
    pub fn new(hub: LoopbackHub) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            hub,
            missing_sort_column: Mutex::new(HashSet::new()),
        }
    }

    /// The hub this backend publishes change events to.
    #[must_use]
    pub const fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    /// Simulates a schema where `table` has no manual sort column: selects
    /// ordered by [`OrderBy::Position`] fail with the undefined-column code.
    pub fn mark_sort_column_missing(&self, table: Table) {
        self.missing_sort_column.lock().insert(table);
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Returns a copy of the row with its identifier replaced.
fn with_id(row: RowData, id: i64) -> RowData {
    match row {
        RowData::Task(mut r) => {
            r.id = TaskId::new(id);
            RowData::Task(r)
        }
        RowData::TaskState(mut r) => {
            r.id = StateId::new(id);
            RowData::TaskState(r)
        }
        RowData::Employee(mut r) => {
            r.id = EmployeeId::new(id);
            RowData::Employee(r)
        }
        RowData::Client(mut r) => {
            r.id = ClientId::new(id);
            RowData::Client(r)
        }
        RowData::Case(mut r) => {
            r.id = CaseId::new(id);
            RowData::Case(r)
        }
        RowData::Note(mut r) => {
            r.id = NoteId::new(id);
            RowData::Note(r)
        }
        RowData::Assignment(mut r) => {
            r.id = id;
            RowData::Assignment(r)
        }
    }
}

/// The row's manual sort position, where its table has one.
fn position_of(row: &RowData) -> i32 {
    match row {
        RowData::Task(r) => r.position,
        RowData::TaskState(r) => r.position,
        RowData::Assignment(r) => r.position,
        RowData::Employee(_) | RowData::Client(_) | RowData::Case(_) | RowData::Note(_) => 0,
    }
}

/// The row's creation timestamp, where its table has one.
fn created_at_of(row: &RowData) -> DateTime<Utc> {
    match row {
        RowData::Task(r) => r.created_at,
        RowData::Note(r) => r.created_at,
        _ => DateTime::UNIX_EPOCH,
    }
}

/// Whether a row passes the select filter.
fn matches_filter(row: &RowData, filter: SelectFilter) -> bool {
    match filter {
        SelectFilter::All => true,
        SelectFilter::CaseScoped(case_id) => match row {
            RowData::Note(r) => r.case_id == case_id,
            RowData::Task(r) => r.case_id == Some(case_id),
            _ => false,
        },
    }
}

impl RemoteDataClient for MemoryBackend {
    async fn select(
        &self,
        table: Table,
        filter: SelectFilter,
        order: Option<OrderBy>,
    ) -> Result<Vec<RowData>, RemoteError> {
        if order == Some(OrderBy::Position) && self.missing_sort_column.lock().contains(&table) {
            return Err(RemoteError::undefined_column(format!(
                "column {table}.position does not exist"
            )));
        }

        let tables = self.tables.lock();
        let mut rows: Vec<RowData> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);

        match order {
            Some(OrderBy::Position) => rows.sort_by_key(position_of),
            Some(OrderBy::CreatedAt) => rows.sort_by_key(created_at_of),
            None => {}
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: RowData) -> Result<RowData, RemoteError> {
        let row = with_id(row, self.allocate_id());
        self.tables
            .lock()
            .entry(table)
            .or_default()
            .push(row.clone());
        self.hub.publish(&ChangeEvent::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(&self, table: Table, id: i64, row: RowData) -> Result<RowData, RemoteError> {
        let row = with_id(row, id);
        {
            let mut tables = self.tables.lock();
            let rows = tables
                .get_mut(&table)
                .ok_or(RemoteError::NotFound { table, id })?;
            let slot = rows
                .iter_mut()
                .find(|r| r.id() == id)
                .ok_or(RemoteError::NotFound { table, id })?;
            *slot = row.clone();
        }
        self.hub.publish(&ChangeEvent::update(table, row.clone()));
        Ok(row)
    }

    async fn delete(&self, table: Table, id: i64) -> Result<RowData, RemoteError> {
        let removed = {
            let mut tables = self.tables.lock();
            let rows = tables
                .get_mut(&table)
                .ok_or(RemoteError::NotFound { table, id })?;
            let index = rows
                .iter()
                .position(|r| r.id() == id)
                .ok_or(RemoteError::NotFound { table, id })?;
            rows.remove(index)
        };
        self.hub
            .publish(&ChangeEvent::delete(table, removed.clone()));
        Ok(removed)
    }
}
