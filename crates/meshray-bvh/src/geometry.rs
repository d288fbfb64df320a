//! Triangle mesh sources a BVH can index.

use meshray_math::{Aabb3, Point3, Transform};

use crate::error::{BvhError, Result};

/// An indexed triangle mesh placed in the world by an affine transform.
///
/// Positions are reported in mesh-local space. The BVH stores local-space
/// bounds and maps query rays through the inverse of [`world_transform`].
///
/// [`world_transform`]: GeometrySource::world_transform
pub trait GeometrySource {
    /// Number of triangles.
    fn triangle_count(&self) -> usize;

    /// Local-space position of corner `corner` (0, 1 or 2) of `triangle`.
    fn vertex_position(&self, triangle: usize, corner: usize) -> Point3;

    /// Object-to-world transform.
    fn world_transform(&self) -> &Transform;

    /// All three corners of `triangle`.
    fn triangle(&self, triangle: usize) -> [Point3; 3] {
        [0, 1, 2].map(|corner| self.vertex_position(triangle, corner))
    }

    /// Local-space bounds of `triangle`.
    fn triangle_bounds(&self, triangle: usize) -> Aabb3 {
        Aabb3::from_points(&self.triangle(triangle))
    }
}

/// Vertex positions plus a triangle index list (three indices per triangle).
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    positions: Vec<Point3>,
    indices: Vec<u32>,
    transform: Transform,
}

impl IndexedMesh {
    /// Create a mesh with an identity transform.
    ///
    /// Fails if `indices` is not a whole number of triangles or references a
    /// vertex past the end of `positions`.
    pub fn new(positions: Vec<Point3>, indices: Vec<u32>) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(BvhError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(BvhError::InvalidMesh(format!(
                "index {bad} out of range for {} vertices",
                positions.len()
            )));
        }
        Ok(Self {
            positions,
            indices,
            transform: Transform::identity(),
        })
    }

    /// Create a mesh from a flat `[x0, y0, z0, x1, ...]` vertex buffer, the
    /// layout render meshes are uploaded in.
    pub fn from_flat(vertices: &[f32], indices: &[u32]) -> Result<Self> {
        if vertices.len() % 3 != 0 {
            return Err(BvhError::InvalidMesh(format!(
                "vertex buffer length {} is not a multiple of 3",
                vertices.len()
            )));
        }
        let positions = vertices
            .chunks_exact(3)
            .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            .collect();
        Self::new(positions, indices.to_vec())
    }

    /// Closed box spanning `min`..`max`: 8 vertices, 12 outward-wound triangles.
    pub fn axis_aligned_box(min: Point3, max: Point3) -> Self {
        let positions = Aabb3::new(min, max).corners().to_vec();
        // Corner index bits are (x, y, z) with x the most significant.
        #[rustfmt::skip]
        let indices = vec![
            0, 1, 3, 0, 3, 2, // -x
            4, 6, 7, 4, 7, 5, // +x
            0, 4, 5, 0, 5, 1, // -y
            2, 3, 7, 2, 7, 6, // +y
            0, 2, 6, 0, 6, 4, // -z
            1, 5, 7, 1, 7, 3, // +z
        ];
        Self {
            positions,
            indices,
            transform: Transform::identity(),
        }
    }

    /// Replace the object-to-world transform.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Vertex positions (local space).
    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Triangle indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl GeometrySource for IndexedMesh {
    fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn vertex_position(&self, triangle: usize, corner: usize) -> Point3 {
        self.positions[self.indices[triangle * 3 + corner] as usize]
    }

    fn world_transform(&self) -> &Transform {
        &self.transform
    }
}
