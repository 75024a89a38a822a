//! Error types for surface mesh queries

use meshstore_spatial::SpatialError;
use thiserror::Error;

use crate::mesh::CellType;

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, QuestError>;

/// Errors raised while building or running queries
#[derive(Debug, Error)]
pub enum QuestError {
    /// Only linear triangles can be queried
    #[error("Cell {cell} has unsupported type {cell_type}")]
    UnsupportedCellType {
        /// Offending cell
        cell: usize,
        /// Its type
        cell_type: CellType,
    },

    /// Argument out of range or inconsistent
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Bounding volume hierarchy misuse
    #[error("Spatial index error: {0}")]
    Spatial(#[from] SpatialError),

    /// Reading or writing results in a DataStore failed
    #[error("Datastore error: {0}")]
    Datastore(#[from] meshstore_core::Error),

    /// Configuration file could not be read, parsed or written
    #[error("Config error: {0}")]
    Config(String),
}

impl QuestError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        QuestError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
