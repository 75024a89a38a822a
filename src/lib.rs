//! Meshstore - hierarchical in-memory datastore and signed distance queries
//!
//! Meshstore is split into four crates. The core types are re-exported at
//! the top level and the other three as modules:
//!
//! - `meshstore-core`: type ids, schemas, names and the shared error type
//! - [`datastore`]: the Buffer/View/Group tree, with JSON save and load
//! - [`spatial`]: points, bounding boxes, triangles and the BVH
//! - [`quest`]: signed distance over surface meshes, grid sampling and
//!   baselines stored in a datastore
//!
//! # Quick Start
//!
//! ```no_run
//! use meshstore::{DataStore, TypeId};
//!
//! let mut ds = DataStore::new();
//! let id = ds.root_mut().create_view_and_allocate("fields/pressure", TypeId::Float64, 8)?;
//! ds.view_mut(id).unwrap().data_mut::<f64>()?.fill(1.0);
//! ds.save_json("fields.json")?;
//! # Ok::<(), meshstore::Error>(())
//! ```

pub use meshstore_datastore as datastore;
pub use meshstore_quest as quest;
pub use meshstore_spatial as spatial;

pub use meshstore_core::{Element, EntityKind, Error, IndexType, Result, Schema, Shape, TypeId};
pub use meshstore_datastore::{
    DataStore, GroupId, GroupMut, GroupRef, SharedDataStore, ViewId, ViewMut, ViewRef, ViewState,
};
pub use meshstore_quest::{QueryConfig, QuestError, SignedDistance, SurfaceMesh, TriangleMesh};
pub use meshstore_spatial::{BoundingBox, BvhTree, Point3, Triangle};
