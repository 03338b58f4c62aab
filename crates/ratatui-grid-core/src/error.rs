//! Error types for the grid engine.

use thiserror::Error;

use crate::record::RowId;
use crate::source::RequestId;

/// Errors surfaced by grid operations.
///
/// Rendering never fails: cell-level construction problems are absorbed by the materializer and
/// only logged. These variants cover caller-facing operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// No column with the given field name exists.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),

    /// The row is not part of the grid's data.
    #[error("row {0:?} not found")]
    RowNotFound(RowId),

    /// A custom cell or editor factory failed to build its component.
    #[error("failed to construct component for `{field}`: {reason}")]
    ComponentConstruction { field: String, reason: String },

    /// A filter cannot be applied to the column it targets.
    #[error("invalid filter on `{field}`: {message}")]
    InvalidFilter { field: String, message: String },

    /// The caller vetoed a drag/drop commit; nothing was changed.
    #[error("drop rejected")]
    DragRejected,

    /// A data response arrived for a request that is no longer the latest one.
    #[error("stale response {got:?} (latest is {expected:?})")]
    StaleResponse { expected: RequestId, got: RequestId },

    /// An editing operation was requested while no cell is being edited.
    #[error("no cell is being edited")]
    NotEditing,
}

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;
