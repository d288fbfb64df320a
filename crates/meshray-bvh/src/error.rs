//! Error types for BVH construction and configuration.

use thiserror::Error;

/// Errors that can occur while building a BVH or preparing its inputs.
///
/// Queries on a built BVH never fail; these only surface from constructors.
#[derive(Error, Debug)]
pub enum BvhError {
    /// The mesh's world transform has no (finite) inverse.
    #[error("world transform is not invertible")]
    SingularTransform,

    /// Triangle count does not fit the `u32` element indices.
    #[error("mesh has {0} triangles, more than a BVH can index")]
    TooManyTriangles(usize),

    /// Index buffer is malformed.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings document could not be parsed.
    #[error("settings parse error: {0}")]
    SettingsJson(#[from] serde_json::Error),
}

/// Result type for BVH operations.
pub type Result<T> = std::result::Result<T, BvhError>;
