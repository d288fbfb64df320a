//! Axis-aligned bounding boxes.

use crate::{Point3, Transform, Vec3};

/// Axis-aligned bounding box in 3D.
///
/// An empty box has `min = +inf` and `max = -inf` so that any union with it
/// yields the other operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point in `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Aabb3) -> Aabb3 {
        Aabb3 {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Midpoint of the box.
    pub fn centroid(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Edge lengths along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Axis (0 = x, 1 = y, 2 = z) with the largest extent. Ties go to the lower axis.
    pub fn max_extent(&self) -> usize {
        let d = self.extent();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// True if `other` lies entirely within `self` (shared faces count).
    pub fn contains(&self, other: &Aabb3) -> bool {
        (0..3).all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    /// True if `p` lies inside or on the boundary.
    pub fn contains_point(&self, p: &Point3) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// The eight corners, `min` first and `max` last.
    pub fn corners(&self) -> [Point3; 8] {
        let (min, max) = (self.min, self.max);
        [
            min,
            Point3::new(min.x, min.y, max.z),
            Point3::new(min.x, max.y, min.z),
            Point3::new(min.x, max.y, max.z),
            Point3::new(max.x, min.y, min.z),
            Point3::new(max.x, min.y, max.z),
            Point3::new(max.x, max.y, min.z),
            max,
        ]
    }

    /// Box enclosing this box after applying `transform` to all eight corners.
    pub fn transformed(&self, transform: &Transform) -> Aabb3 {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners().map(|c| transform.apply_point(&c));
        Aabb3::from_points(&corners)
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}
