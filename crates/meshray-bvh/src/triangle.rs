//! Ray-triangle intersection.

use meshray_math::Point3;

use crate::Ray;

/// Möller-Trumbore ray-triangle intersection.
///
/// Returns the ray parameter of the crossing, or `None` when the ray misses,
/// runs parallel to the triangle plane, or crosses at `t <= epsilon`.
/// Both triangle windings are accepted.
pub fn intersect_triangle(
    ray: &Ray,
    v0: &Point3,
    v1: &Point3,
    v2: &Point3,
    epsilon: f64,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let h = ray.direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() <= epsilon {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * ray.direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > epsilon).then_some(t)
}
