#![warn(missing_docs)]

//! Bounding volume hierarchy and ray queries over triangle meshes.
//!
//! A [`Bvh`] indexes a mesh exposed through [`GeometrySource`] and answers
//! ray-crossing counts, closest hits, and point containment. Rays and
//! points are given in world space; the mesh stays in its own local space.
//!
//! # Architecture
//!
//! - [`build`] - recursive median-split construction into an index arena
//! - [`flatten`] - pre-order linearization into [`LinearNode`]s
//! - [`Bvh`] - iterative stack traversal, containment, and picking queries
//! - [`geometry`] - the mesh adapter trait and [`IndexedMesh`]
//!
//! # Example
//!
//! ```
//! use meshray_bvh::{Bvh, IndexedMesh, Ray};
//! use meshray_math::{Point3, Vec3};
//!
//! let mesh = IndexedMesh::axis_aligned_box(
//!     Point3::new(-0.5, -0.5, -0.5),
//!     Point3::new(0.5, 0.5, 0.5),
//! );
//! let bvh = Bvh::build(&mesh).unwrap();
//!
//! let ray = Ray::new(Point3::new(-2.0, 0.1, 0.2), Vec3::new(1.0, 0.0, 0.0));
//! assert_eq!(bvh.intersect(&ray), 2);
//! assert!(bvh.is_inside(&Point3::origin()));
//! ```

pub mod build;
mod bvh;
pub mod error;
pub mod flatten;
pub mod geometry;
mod pick;
mod ray;
mod settings;
mod triangle;

pub use bvh::{Bvh, MAX_TRAVERSAL_DEPTH};
pub use error::{BvhError, Result};
pub use flatten::{LinearNode, LinearNodeKind};
pub use geometry::{GeometrySource, IndexedMesh};
pub use pick::TrianglePicker;
pub use ray::{Ray, RayHit};
pub use settings::BvhSettings;
pub use triangle::intersect_triangle;
