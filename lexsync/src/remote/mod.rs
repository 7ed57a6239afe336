//! Remote data client abstraction over the hosted table store.
//!
//! The engine never talks to the backend directly; everything goes through
//! [`RemoteDataClient`]. The server is the source of truth — the local
//! caches are read-through projections of what these calls return.

pub mod memory;

pub use memory::MemoryBackend;

use std::future::Future;

use lexsync_proto::change::{RowData, Table};
use lexsync_proto::directory::CaseId;

/// Provider error code for an undefined column (Postgres `42703`).
///
/// The one code the engine interprets: ordering by the manual sort column
/// can fail on schemas that predate it, in which case the repository
/// retries ordering by creation timestamp.
pub const UNDEFINED_COLUMN: &str = "42703";

/// Errors returned by the remote data client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The provider rejected the operation with a specific code.
    #[error("provider error {code}: {message}")]
    Provider {
        /// Provider-specific error code.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// The request never reached the provider or the response was lost.
    #[error("network error: {0}")]
    Network(String),

    /// The addressed row does not exist.
    #[error("row not found in {table}: {id}")]
    NotFound {
        /// Table that was addressed.
        table: Table,
        /// Row identifier that was addressed.
        id: i64,
    },

    /// A select returned a row of the wrong shape for its table.
    #[error("unexpected row shape for {table}")]
    UnexpectedRow {
        /// Table the row came from.
        table: Table,
    },
}

impl RemoteError {
    /// Builds the provider error for a missing column.
    #[must_use]
    pub fn undefined_column(message: impl Into<String>) -> Self {
        Self::Provider {
            code: UNDEFINED_COLUMN.to_string(),
            message: message.into(),
        }
    }

    /// Whether this is the undefined-column provider error.
    #[must_use]
    pub fn is_undefined_column(&self) -> bool {
        matches!(self, Self::Provider { code, .. } if code == UNDEFINED_COLUMN)
    }
}

/// Row ordering for a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Order by the manual sort column. May not exist on older schemas.
    Position,
    /// Order by creation timestamp (always present).
    CreatedAt,
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Position => write!(f, "position"),
            Self::CreatedAt => write!(f, "created_at"),
        }
    }
}

/// Row filtering for a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectFilter {
    /// All rows of the table.
    #[default]
    All,
    /// Rows belonging to one legal case (notes).
    CaseScoped(CaseId),
}

/// Async client for the hosted table store.
///
/// Implementations publish a change event for every successful mutation;
/// the engine's realtime bridge reconciles caches from that stream, never
/// from the mutation's return value alone.
pub trait RemoteDataClient: Send + Sync {
    /// Selects rows from a table, optionally filtered and ordered.
    fn select(
        &self,
        table: Table,
        filter: SelectFilter,
        order: Option<OrderBy>,
    ) -> impl Future<Output = Result<Vec<RowData>, RemoteError>> + Send;

    /// Inserts a row. The backend assigns the row identifier; the returned
    /// payload carries it.
    fn insert(&self, table: Table, row: RowData)
    -> impl Future<Output = Result<RowData, RemoteError>> + Send;

    /// Replaces a row by identifier, returning the committed payload.
    fn update(
        &self,
        table: Table,
        id: i64,
        row: RowData,
    ) -> impl Future<Output = Result<RowData, RemoteError>> + Send;

    /// Deletes a row by identifier, returning its last image.
    fn delete(&self, table: Table, id: i64)
    -> impl Future<Output = Result<RowData, RemoteError>> + Send;
}
