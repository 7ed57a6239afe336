//! Task state catalog records.
//!
//! Task states are a server-managed catalog (name, color, display order).
//! The `category` field is the semantic axis: a task whose state category
//! is [`StateCategory::Completado`] is finished, which gates its visibility
//! in every view except the finished one.

use serde::{Deserialize, Serialize};

/// Unique identifier for a task state row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct StateId(i64);

impl StateId {
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

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semantic category of a task state.
///
/// Serialized with the Spanish wire values used by the backing schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    /// Work not yet started.
    Pendiente,
    /// Work in progress.
    EnProgreso,
    /// Work finished.
    Completado,
}

impl StateCategory {
    /// Whether this category marks a task as finished.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completado)
    }
}

impl std::fmt::Display for StateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pendiente => write!(f, "pendiente"),
            Self::EnProgreso => write!(f, "en_progreso"),
            Self::Completado => write!(f, "completado"),
        }
    }
}

/// A task state catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Row identifier.
    pub id: StateId,
    /// Display name, e.g. "En pausa".
    pub name: String,
    /// Descriptive color for the UI (hex string).
    pub color: String,
    /// Semantic category.
    pub category: StateCategory,
    /// Display order within the catalog.
    pub position: i32,
    /// Inactive states stay on historical tasks but are not offered for new ones.
    pub active: bool,
}

impl TaskState {
    /// Whether tasks in this state count as finished.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.category.is_finished()
    }

    /// Whether this state is a "paused" state, identified by name.
    ///
    /// The catalog does not carry a dedicated paused category; the paused
    /// view matches any state whose name contains "pausa" (case-insensitive).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.name.to_lowercase().contains("pausa")
    }
}
