//! Error types for the meshstore datastore
//!
//! This module defines the error type used by Buffer/View/Group/DataStore
//! operations. We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.

use crate::name::NameError;
use crate::types::{IndexType, TypeId};
use std::io;
use thiserror::Error;

/// Result type alias for datastore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of datastore entity named in a `NotFound` error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A View
    View,
    /// A Group
    Group,
    /// A Buffer
    Buffer,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::View => f.write_str("view"),
            EntityKind::Group => f.write_str("group"),
            EntityKind::Buffer => f.write_str("buffer"),
        }
    }
}

/// Error types for the datastore
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (saving or loading an exported document)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Imported document is missing a field or has an ill-typed one
    #[error("Import error: {0}")]
    Import(String),

    /// Name is not a valid child name
    #[error("Invalid name '{name}': {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: NameError,
    },

    /// A sibling View or Group already uses the name
    #[error("Group '{group}' already has a child named '{name}'")]
    NameCollision {
        /// Path of the parent group
        group: String,
        /// The colliding name
        name: String,
    },

    /// Entity does not exist
    #[error("No {kind} named '{name}'")]
    NotFound {
        /// Kind of entity looked up
        kind: EntityKind,
        /// Name, path or index that was looked up
        name: String,
    },

    /// Operation is not valid in the View's current state
    #[error("View '{path}' in state {state} does not allow {operation}")]
    InvalidState {
        /// Path of the View
        path: String,
        /// Name of the current state
        state: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// View is not described
    #[error("View '{path}' has no data description")]
    NotDescribed {
        /// Path of the View
        path: String,
    },

    /// Allocation through a View whose Buffer is shared with other Views
    #[error("View '{path}' cannot allocate: buffer {buffer} is attached to {views} views")]
    SharedBuffer {
        /// Path of the View
        path: String,
        /// Buffer index
        buffer: usize,
        /// Number of attached views
        views: usize,
    },

    /// Buffer has attached Views and cannot be destroyed or re-laid-out
    #[error("Buffer {buffer} is attached to {views} views")]
    BufferInUse {
        /// Buffer index
        buffer: usize,
        /// Number of attached views
        views: usize,
    },

    /// Described bytes exceed the bytes available
    #[error("View '{path}' describes {required} bytes but only {available} are available")]
    InsufficientBuffer {
        /// Path of the View
        path: String,
        /// Bytes spanned by the description
        required: IndexType,
        /// Bytes allocated in the buffer
        available: IndexType,
    },

    /// Element count is negative
    #[error("Element count must be >= 0, got {count}")]
    NegativeCount {
        /// The rejected count
        count: IndexType,
    },

    /// Type id is `NoType` where a concrete type is required
    #[error("A concrete element type is required")]
    NoType,

    /// Offset or stride is not a whole number of elements
    #[error(
        "Unsupported layout on View '{path}': {what} of {bytes} bytes is not a multiple of the element size {element_bytes}"
    )]
    NonIntegralLayout {
        /// Path of the View
        path: String,
        /// "offset" or "stride"
        what: &'static str,
        /// The value in bytes
        bytes: IndexType,
        /// Element size in bytes
        element_bytes: usize,
    },

    /// Offset is negative or stride is not positive
    #[error("View '{path}' has an invalid layout: offset {offset}, stride {stride}")]
    InvalidLayout {
        /// Path of the View
        path: String,
        /// Requested offset, in elements
        offset: IndexType,
        /// Requested stride, in elements
        stride: IndexType,
    },

    /// Typed access with a different element type than described
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Described type
        expected: TypeId,
        /// Requested type
        actual: TypeId,
    },

    /// Slice access on a strided description
    #[error("View '{path}' is not contiguous")]
    NonContiguous {
        /// Path of the View
        path: String,
    },

    /// Index past the end of the described elements
    #[error("Index {index} out of range for {len} elements")]
    IndexOutOfRange {
        /// Requested index
        index: IndexType,
        /// Number of elements
        len: IndexType,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl Error {
    /// Short, stable label for the error category (used in diagnostics)
    pub fn label(&self) -> &'static str {
        match self {
            Error::IoError(_) => "io",
            Error::SerializationError(_) => "serialization",
            Error::Import(_) => "import",
            Error::InvalidName { .. } => "invalid_name",
            Error::NameCollision { .. } => "name_collision",
            Error::NotFound { .. } => "not_found",
            Error::InvalidState { .. } => "invalid_state",
            Error::NotDescribed { .. } => "not_described",
            Error::SharedBuffer { .. } => "shared_buffer",
            Error::BufferInUse { .. } => "buffer_in_use",
            Error::InsufficientBuffer { .. } => "insufficient_buffer",
            Error::NegativeCount { .. } => "negative_count",
            Error::NoType => "no_type",
            Error::NonIntegralLayout { .. } => "non_integral_layout",
            Error::InvalidLayout { .. } => "invalid_layout",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::NonContiguous { .. } => "non_contiguous",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
        }
    }
}
