//! Integration Tests
//!
//! Cross-crate tests through the `meshstore` facade:
//! - pipeline: mesh to grid results to a saved datastore and back
//! - shared_store: a DataStore behind a lock, read from many threads
//! - persistence: save and load of a mixed View tree

#[path = "../common/mod.rs"]
mod common;

mod persistence;
mod pipeline;
mod shared_store;
