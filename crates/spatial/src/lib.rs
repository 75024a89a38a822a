//! Spatial primitives for meshstore
//!
//! - Point / BoundingBox: fixed-dimension geometry in `f64`
//! - Triangle: closest point, squared distance and plane orientation
//! - BvhTree: bucketed bounding volume hierarchy for candidate queries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bbox;
pub mod bvh;
pub mod error;
pub mod point;
pub mod triangle;

pub use bbox::BoundingBox;
pub use bvh::BvhTree;
pub use error::{Result, SpatialError};
pub use point::{Point, Point2, Point3};
pub use triangle::{Orientation, Triangle};
