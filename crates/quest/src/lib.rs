//! Signed distance queries over surface meshes
//!
//! A [`SignedDistance`] indexes the triangle cells of a [`SurfaceMesh`] in a
//! BVH and answers point queries from many threads at once. The grid
//! helpers sample a uniform lattice, and the baseline helpers keep the
//! results in a DataStore group so that later runs can be compared against
//! them.
//!
//! ```no_run
//! use meshstore_quest::{evaluate_grid, QueryConfig, SignedDistance, TriangleMesh, UniformGrid};
//! use meshstore_spatial::Point3;
//!
//! let config = QueryConfig::default();
//! let mesh = TriangleMesh::sphere(Point3::origin(), 1.0, 16, 32);
//! let query = SignedDistance::from_config(mesh, &config)?;
//! let grid = UniformGrid::from_config(&config, query.mesh_bounds())?;
//! let result = evaluate_grid(&query, &grid, config.parallel);
//! println!("{} of {} nodes inside", result.num_inside(), result.len());
//! # Ok::<(), meshstore_quest::QuestError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod baseline;
pub mod config;
pub mod error;
pub mod grid;
pub mod mesh;
pub mod signed_distance;

pub use baseline::{
    compare_to_baseline, load_baseline, store_baseline, Baseline, BaselineComparison,
};
pub use config::{QueryConfig, CONFIG_FILE_NAME};
pub use error::{QuestError, Result};
pub use grid::{evaluate_grid, GridResult, UniformGrid};
pub use mesh::{CellType, SurfaceMesh, TriangleMesh, UnstructuredMesh};
pub use signed_distance::{brute_force_distance, SignedDistance, NO_SURFACE_DISTANCE};
