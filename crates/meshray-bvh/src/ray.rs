//! Ray representation and the ray-box slab test.

use meshray_math::{Aabb3, Point3, Transform, Vec3};

/// A ray in 3D space defined by origin and direction.
///
/// The direction is kept as given (not normalized), so a ray mapped through
/// an affine transform keeps the same parameter `t` for the same point.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Direction of the ray.
    pub direction: Vec3,
    /// Reciprocal of direction components. Zero components give infinities.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let inv = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Self {
            origin,
            direction,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// The same ray expressed in another space.
    pub fn transformed(&self, transform: &Transform) -> Ray {
        Ray::new(
            transform.apply_point(&self.origin),
            transform.apply_vec(&self.direction),
        )
    }

    /// True if the ray travels toward negative coordinates along `axis`.
    #[inline]
    pub fn dir_is_negative(&self, axis: usize) -> bool {
        self.sign[axis] == 1
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` with `t_min` clamped to zero when the
    /// ray hits the box in front of its origin, `None` otherwise.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        // f64::max/min drop a NaN operand (0 * inf when the origin sits on a slab).
        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }

    /// Boolean form of [`Ray::intersect_aabb`].
    #[inline]
    pub fn hits_aabb(&self, aabb: &Aabb3) -> bool {
        self.intersect_aabb(aabb).is_some()
    }
}

/// Result of a closest-hit query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Parameter along the query ray where the intersection occurs.
    pub t: f64,
    /// World-space intersection point.
    pub point: Point3,
    /// Index of the hit triangle in the source mesh.
    pub triangle: u32,
}
