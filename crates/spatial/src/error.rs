//! Error types for spatial structures

use thiserror::Error;

/// Result type alias for spatial operations
pub type Result<T> = std::result::Result<T, SpatialError>;

/// Misuse of a [`BvhTree`](crate::BvhTree)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpatialError {
    /// `insert` or `build` after the tree was built
    #[error("BVH tree is already built")]
    AlreadyBuilt,

    /// Query or bucket access before `build`
    #[error("BVH tree has not been built")]
    NotBuilt,

    /// Construction or build parameter out of range
    #[error("Invalid parameter {name} = {value}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Rejected value
        value: usize,
    },

    /// Bucket index past the last bucket
    #[error("Bucket {bucket} out of range ({buckets} buckets)")]
    BucketOutOfRange {
        /// Requested bucket
        bucket: usize,
        /// Number of buckets
        buckets: usize,
    },

    /// Object index past the last inserted object
    #[error("Object {object} out of range ({objects} objects)")]
    ObjectOutOfRange {
        /// Requested object
        object: usize,
        /// Number of objects
        objects: usize,
    },
}
