//! Hierarchical Buffer/View/Group datastore
//!
//! A [`DataStore`] owns three kinds of entity:
//! - Buffer: a typed, contiguous, 8-aligned allocation addressed by index
//! - View: a named, typed description of a region of data
//! - Group: a named container of Views and child Groups
//!
//! Views and Groups are addressed by generational handles ([`ViewId`],
//! [`GroupId`]) or by slash-separated paths relative to a Group. Mutating
//! operations come in two forms: `try_*` returning a [`Result`], and a
//! chainable form that records a [`Diagnostic`] instead of failing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod buffer;
pub mod datastore;
pub mod diagnostics;
pub mod export;
pub mod group;
pub mod view;

pub use arena::{ArenaId, GroupId, ViewId};
pub use buffer::Buffer;
pub use datastore::{DataStore, SharedDataStore};
pub use diagnostics::Diagnostic;
pub use export::{BufferRecord, ChildGroupRecord, Document, GroupRecord, ViewRecord};
pub use group::{Group, GroupMut, GroupRef};
pub use view::{ExternalPtr, View, ViewMut, ViewRef, ViewState};

pub use meshstore_core::{Element, Error, IndexType, Result, Schema, Shape, TypeId};
