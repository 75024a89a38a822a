//! Core types for meshstore
//!
//! This crate defines the foundational types used throughout the system:
//! - TypeId / Element: primitive element types and their Rust counterparts
//! - Schema / Shape: type, count, offset and stride of a described region
//! - name: naming and path rules shared by Views and Groups
//! - Error: error type for datastore operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod name;
pub mod schema;
pub mod types;

pub use error::{EntityKind, Error, Result};
pub use name::{join_path, split_path, validate_name, NameError, PATH_DELIMITER};
pub use schema::{shape_num_elements, Schema, Shape};
pub use types::{Element, IndexType, TypeId};
