//! Row-level change events delivered by the change-notification stream.
//!
//! Events are delivered at-least-once, per-table, in commit order. There is
//! no ordering guarantee across tables, and none relative to fetches the
//! same client has in flight — a refetch is always authoritative.

use serde::{Deserialize, Serialize};

use crate::directory::{CaseRecord, Client, NoteRecord};
use crate::employee::Employee;
use crate::state::TaskState;
use crate::task::{TaskAssignment, TaskRecord};

/// Every table the sync layer watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// `tareas` — task rows.
    Tasks,
    /// `tarea_estados` — task state catalog.
    TaskStates,
    /// `empleados` — employee directory.
    Employees,
    /// `clientes` — client directory.
    Clients,
    /// `procesos` — legal cases.
    Cases,
    /// `notas` — per-case notes.
    Notes,
    /// `tarea_responsables` — responsible-assignment join rows.
    TaskResponsible,
    /// `tarea_designados` — designated-assignment join rows.
    TaskDesignated,
}

/// All watched tables, in subscription order.
pub const WATCHED_TABLES: [Table; 8] = [
    Table::Tasks,
    Table::TaskStates,
    Table::Employees,
    Table::Clients,
    Table::Cases,
    Table::Notes,
    Table::TaskResponsible,
    Table::TaskDesignated,
];

impl Table {
    /// The table's name on the wire and in the backing schema.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Tasks => "tareas",
            Self::TaskStates => "tarea_estados",
            Self::Employees => "empleados",
            Self::Clients => "clientes",
            Self::Cases => "procesos",
            Self::Notes => "notas",
            Self::TaskResponsible => "tarea_responsables",
            Self::TaskDesignated => "tarea_designados",
        }
    }

    /// Whether rows of this table can be patched into the cache directly.
    ///
    /// Flat tables carry the full entity in each event, so insert/update/
    /// delete map to minimal cache patches. Relational tables (tasks, cases,
    /// and the assignment join tables) feed queries whose payload is a
    /// joined shape that cannot be reconstructed from a single row; changes
    /// to them must invalidate and refetch the owning query instead.
    #[must_use]
    pub const fn is_flat(self) -> bool {
        matches!(
            self,
            Self::TaskStates | Self::Employees | Self::Clients | Self::Notes
        )
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Kind of row-level operation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// A new row was committed.
    Insert,
    /// An existing row changed.
    Update,
    /// A row was removed.
    Delete,
}

/// A typed row payload, one variant per watched table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowData {
    /// A `tareas` row.
    Task(TaskRecord),
    /// A `tarea_estados` row.
    TaskState(TaskState),
    /// An `empleados` row.
    Employee(Employee),
    /// A `clientes` row.
    Client(Client),
    /// A `procesos` row.
    Case(CaseRecord),
    /// A `notas` row.
    Note(NoteRecord),
    /// A join row from either assignment table.
    Assignment(TaskAssignment),
}

impl RowData {
    /// The raw row identifier of the payload.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Task(r) => r.id.get(),
            Self::TaskState(r) => r.id.get(),
            Self::Employee(r) => r.id.get(),
            Self::Client(r) => r.id.get(),
            Self::Case(r) => r.id.get(),
            Self::Note(r) => r.id.get(),
            Self::Assignment(r) => r.id,
        }
    }
}

/// One row-level change on a watched table.
///
/// `new_row` is present for insert/update; `old_row` for delete. Both may
/// be present on update when the stream includes the previous image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the change happened on.
    pub table: Table,
    /// Operation kind.
    pub op: ChangeOp,
    /// The committed row (insert/update).
    pub new_row: Option<RowData>,
    /// The previous row image (delete, optionally update).
    pub old_row: Option<RowData>,
}

impl ChangeEvent {
    /// Builds an insert event.
    #[must_use]
    pub const fn insert(table: Table, row: RowData) -> Self {
        Self {
            table,
            op: ChangeOp::Insert,
            new_row: Some(row),
            old_row: None,
        }
    }

    /// Builds an update event.
    #[must_use]
    pub const fn update(table: Table, row: RowData) -> Self {
        Self {
            table,
            op: ChangeOp::Update,
            new_row: Some(row),
            old_row: None,
        }
    }

    /// Builds a delete event carrying the removed row's last image.
    #[must_use]
    pub const fn delete(table: Table, old_row: RowData) -> Self {
        Self {
            table,
            op: ChangeOp::Delete,
            new_row: None,
            old_row: Some(old_row),
        }
    }

    /// The identifier of the affected row, taken from whichever image is
    /// present.
    #[must_use]
    pub fn row_id(&self) -> Option<i64> {
        self.new_row
            .as_ref()
            .or(self.old_row.as_ref())
            .map(RowData::id)
    }
}

/// Encodes a [`ChangeEvent`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(event: &ChangeEvent) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(event).map_err(|e| format!("change event encode error: {e}"))
}

/// Decodes a [`ChangeEvent`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode(bytes: &[u8]) -> Result<ChangeEvent, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("change event decode error: {e}"))
}
