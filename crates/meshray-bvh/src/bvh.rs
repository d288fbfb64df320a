//! Bounding Volume Hierarchy over a triangle mesh.
//!
//! The tree lives in a flat pre-order array and is walked iteratively with
//! a fixed-size stack, visiting the child nearer to the ray origin first.

use meshray_math::{Aabb3, Point3, Transform};
use rayon::prelude::*;

use crate::build::{build_tree, collect_primitives};
use crate::error::{BvhError, Result};
use crate::flatten::{flatten, LinearNode, LinearNodeKind};
use crate::geometry::GeometrySource;
use crate::settings::BvhSettings;
use crate::triangle::intersect_triangle;
use crate::{Ray, RayHit};

/// Capacity of the traversal stack.
///
/// The builder always splits at the range midpoint, so a tree over at most
/// `u32::MAX` triangles is at most 33 levels deep and never gets close.
/// Exceeding it means the node array is corrupt.
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// Bounding Volume Hierarchy for ray queries against a borrowed mesh.
///
/// All bounds are stored in mesh-local space; query rays and points are
/// given in world space and mapped through the inverse world transform.
#[derive(Debug)]
pub struct Bvh<'a, G: GeometrySource + ?Sized> {
    nodes: Vec<LinearNode>,
    ordered_elements: Vec<u32>,
    geometry: &'a G,
    to_local: Transform,
    settings: BvhSettings,
}

impl<'a, G: GeometrySource + ?Sized> Bvh<'a, G> {
    /// Build a BVH over `geometry` with default settings.
    pub fn build(geometry: &'a G) -> Result<Self> {
        Self::build_with(geometry, BvhSettings::default())
    }

    /// Build a BVH over `geometry`.
    ///
    /// An empty mesh yields an empty BVH whose queries all miss, whatever
    /// its world transform. Otherwise fails if the settings are invalid, the
    /// world transform is singular, or the mesh has more than `u32::MAX`
    /// triangles.
    #[tracing::instrument(skip_all, fields(triangles = geometry.triangle_count()))]
    pub fn build_with(geometry: &'a G, settings: BvhSettings) -> Result<Self> {
        settings.validate()?;

        let count = geometry.triangle_count();
        if u32::try_from(count).is_err() {
            return Err(BvhError::TooManyTriangles(count));
        }
        // Queries on an empty BVH never map rays into local space.
        let to_local = if count == 0 {
            Transform::identity()
        } else {
            geometry
                .world_transform()
                .inverse()
                .ok_or(BvhError::SingularTransform)?
        };

        let mut primitives = collect_primitives(geometry);
        let tree = build_tree(&mut primitives);
        let nodes = flatten(&tree);
        tracing::debug!(nodes = nodes.len(), depth = tree.depth(), "built bvh");

        Ok(Self {
            nodes,
            ordered_elements: tree.ordered_elements,
            geometry,
            to_local,
            settings,
        })
    }

    /// Count the triangles crossed by `ray` (world space).
    ///
    /// Every crossing with `t > triangle_epsilon` counts, in any order.
    pub fn intersect(&self, ray: &Ray) -> u32 {
        if self.nodes.is_empty() {
            return 0;
        }
        let ray = ray.transformed(&self.to_local);

        let mut hits = 0;
        let mut todo = TraversalStack::new();
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            if ray.hits_aabb(&node.bounds) {
                match node.kind {
                    LinearNodeKind::Leaf {
                        elements_offset,
                        element_count,
                    } => {
                        for &element in self.elements(elements_offset, element_count) {
                            if self.hit_element(&ray, element).is_some() {
                                hits += 1;
                            }
                        }
                    }
                    LinearNodeKind::Interior {
                        split_axis,
                        second_child_offset,
                    } => {
                        let (near, far) =
                            ordered_children(&ray, current, split_axis, second_child_offset);
                        todo.push(far);
                        current = near;
                        continue;
                    }
                }
            }
            match todo.pop() {
                Some(next) => current = next,
                None => break,
            }
        }
        hits
    }

    /// Nearest triangle crossed by `ray` (world space).
    ///
    /// `t` and `point` refer to the ray as passed in.
    pub fn intersect_closest(&self, ray: &Ray) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let local = ray.transformed(&self.to_local);

        let mut closest: Option<(f64, u32)> = None;
        let mut todo = TraversalStack::new();
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            let closest_t = closest.map_or(f64::INFINITY, |(t, _)| t);
            match local.intersect_aabb(&node.bounds) {
                Some((t_enter, _)) if t_enter <= closest_t => match node.kind {
                    LinearNodeKind::Leaf {
                        elements_offset,
                        element_count,
                    } => {
                        for &element in self.elements(elements_offset, element_count) {
                            if let Some(t) = self.hit_element(&local, element) {
                                if closest.map_or(true, |(best, _)| t < best) {
                                    closest = Some((t, element));
                                }
                            }
                        }
                    }
                    LinearNodeKind::Interior {
                        split_axis,
                        second_child_offset,
                    } => {
                        let (near, far) =
                            ordered_children(&local, current, split_axis, second_child_offset);
                        todo.push(far);
                        current = near;
                        continue;
                    }
                },
                _ => {}
            }
            match todo.pop() {
                Some(next) => current = next,
                None => break,
            }
        }

        closest.map(|(t, triangle)| RayHit {
            t,
            point: ray.at(t),
            triangle,
        })
    }

    /// Parity test: is `point` (world space) inside the mesh?
    ///
    /// Casts the two probe rays from [`BvhSettings::containment_probes`] and
    /// reports inside only when both cross the mesh an odd number of times.
    /// Meant for closed meshes; a probe grazing an edge or vertex can still
    /// miscount, so treat the answer as a heuristic.
    pub fn is_inside(&self, point: &Point3) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        self.settings
            .probe_directions()
            .iter()
            .all(|dir| self.intersect(&Ray::new(*point, *dir)) % 2 == 1)
    }

    /// Count crossings for many rays in parallel.
    pub fn intersect_batch(&self, rays: &[Ray]) -> Vec<u32>
    where
        G: Sync,
    {
        rays.par_iter().map(|ray| self.intersect(ray)).collect()
    }

    /// Nodes whose bounds `ray` (world space) passes through, in pre-order.
    ///
    /// Children are only visited when their parent is hit, which is the set
    /// of boxes a debug view draws for a ray.
    pub fn nodes_hit(&self, ray: &Ray) -> Vec<usize> {
        let mut visited = Vec::new();
        if self.nodes.is_empty() {
            return visited;
        }
        let ray = ray.transformed(&self.to_local);

        let mut todo = TraversalStack::new();
        let mut current = 0;
        loop {
            let node = &self.nodes[current];
            if ray.hits_aabb(&node.bounds) {
                visited.push(current);
                if let LinearNodeKind::Interior {
                    second_child_offset,
                    ..
                } = node.kind
                {
                    todo.push(second_child_offset as usize);
                    current += 1;
                    continue;
                }
            }
            match todo.pop() {
                Some(next) => current = next,
                None => break,
            }
        }
        visited
    }

    /// Bounds of `node` mapped into world space.
    pub fn world_bounds(&self, node: usize) -> Aabb3 {
        self.nodes[node]
            .bounds
            .transformed(self.geometry.world_transform())
    }

    /// Local-space bounds of the whole mesh, `None` when empty.
    pub fn root_bounds(&self) -> Option<Aabb3> {
        self.nodes.first().map(|n| n.bounds)
    }

    /// The flattened nodes; `nodes()[0]` is the root.
    pub fn nodes(&self) -> &[LinearNode] {
        &self.nodes
    }

    /// Original triangle indices in leaf order.
    pub fn ordered_elements(&self) -> &[u32] {
        &self.ordered_elements
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True if the BVH indexes no triangles.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The indexed mesh.
    pub fn geometry(&self) -> &'a G {
        self.geometry
    }

    /// Settings used for queries.
    pub fn settings(&self) -> &BvhSettings {
        &self.settings
    }

    fn elements(&self, offset: u32, count: u32) -> &[u32] {
        &self.ordered_elements[offset as usize..(offset + count) as usize]
    }

    fn hit_element(&self, local_ray: &Ray, element: u32) -> Option<f64> {
        let [v0, v1, v2] = self.geometry.triangle(element as usize);
        intersect_triangle(local_ray, &v0, &v1, &v2, self.settings.triangle_epsilon)
    }
}

/// `(near, far)` children of the interior node at `current`.
#[inline]
fn ordered_children(
    ray: &Ray,
    current: usize,
    split_axis: u8,
    second_child_offset: u32,
) -> (usize, usize) {
    let first = current + 1;
    let second = second_child_offset as usize;
    if ray.dir_is_negative(split_axis as usize) {
        (second, first)
    } else {
        (first, second)
    }
}

/// Fixed-capacity stack of node indices still to visit.
struct TraversalStack {
    items: [usize; MAX_TRAVERSAL_DEPTH],
    len: usize,
}

impl TraversalStack {
    fn new() -> Self {
        Self {
            items: [0; MAX_TRAVERSAL_DEPTH],
            len: 0,
        }
    }

    #[inline]
    fn push(&mut self, node: usize) {
        debug_assert!(
            self.len < MAX_TRAVERSAL_DEPTH,
            "bvh traversal stack overflow"
        );
        self.items[self.len] = node;
        self.len += 1;
    }

    #[inline]
    fn pop(&mut self) -> Option<usize> {
        self.len = self.len.checked_sub(1)?;
        Some(self.items[self.len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::IndexedMesh;
    use approx::assert_relative_eq;
    use meshray_math::Vec3;

    fn single_triangle() -> IndexedMesh {
        IndexedMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap()
    }

    fn unit_cube() -> IndexedMesh {
        IndexedMesh::axis_aligned_box(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
    }

    /// Height field over an `n x n` grid, two triangles per cell.
    fn terrain(n: u32) -> IndexedMesh {
        let mut positions = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let (x, y) = (i as f64, j as f64);
                positions.push(Point3::new(x, y, (x * 0.7).sin() + (y * 0.3).cos()));
            }
        }
        let mut indices = Vec::new();
        let row = n + 1;
        for j in 0..n {
            for i in 0..n {
                let a = j * row + i;
                indices.extend_from_slice(&[a, a + 1, a + row + 1, a, a + row + 1, a + row]);
            }
        }
        IndexedMesh::new(positions, indices).unwrap()
    }

    /// Several disjoint boxes in one mesh.
    fn box_row(count: usize) -> IndexedMesh {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for k in 0..count {
            let x = k as f64 * 3.0;
            let b = IndexedMesh::axis_aligned_box(
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 1.0, 1.0, 1.0),
            );
            let base = positions.len() as u32;
            positions.extend_from_slice(b.positions());
            indices.extend(b.indices().iter().map(|i| i + base));
        }
        IndexedMesh::new(positions, indices).unwrap()
    }

    fn brute_force_count<G: GeometrySource>(mesh: &G, ray: &Ray) -> u32 {
        let local = ray.transformed(&mesh.world_transform().inverse().unwrap());
        (0..mesh.triangle_count())
            .filter(|&t| {
                let [a, b, c] = mesh.triangle(t);
                intersect_triangle(&local, &a, &b, &c, BvhSettings::default().triangle_epsilon)
                    .is_some()
            })
            .count() as u32
    }

    /// Deterministic pseudo-random values in [0, 1).
    fn lcg(seed: &mut u64) -> f64 {
        *seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (*seed >> 11) as f64 / (1u64 << 53) as f64
    }

    #[test]
    fn test_single_triangle_hit() {
        let mesh = single_triangle();
        let bvh = Bvh::build(&mesh).unwrap();
        let ray = Ray::new(Point3::new(0.25, 0.25, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(bvh.intersect(&ray), 1);
    }

    #[test]
    fn test_single_triangle_miss() {
        let mesh = single_triangle();
        let bvh = Bvh::build(&mesh).unwrap();
        let ray = Ray::new(Point3::new(10.0, 10.0, -1.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(bvh.intersect(&ray), 0);
        assert!(bvh.intersect_closest(&ray).is_none());
    }

    #[test]
    fn test_cube_containment() {
        let mesh = unit_cube();
        let bvh = Bvh::build(&mesh).unwrap();
        assert!(bvh.is_inside(&Point3::new(0.0, 0.0, 0.0)));
        assert!(!bvh.is_inside(&Point3::new(10.0, 10.0, 10.0)));
        assert!(!bvh.is_inside(&Point3::new(0.0, 0.0, 0.9)));
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = IndexedMesh::default();
        let bvh = Bvh::build(&mesh).unwrap();
        assert!(bvh.is_empty());
        assert_eq!(bvh.node_count(), 0);
        assert!(bvh.root_bounds().is_none());
        let ray = Ray::new(Point3::origin(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(bvh.intersect(&ray), 0);
        assert!(bvh.intersect_closest(&ray).is_none());
        assert!(bvh.nodes_hit(&ray).is_empty());
        assert!(!bvh.is_inside(&Point3::origin()));
    }

    #[test]
    fn test_empty_mesh_ignores_singular_transform() {
        let mesh = IndexedMesh::default().with_transform(Transform::scale(0.0, 0.0, 0.0));
        let bvh = Bvh::build(&mesh).unwrap();
        assert!(bvh.is_empty());
        let ray = Ray::new(Point3::origin(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bvh.intersect(&ray), 0);
        assert!(!bvh.is_inside(&Point3::origin()));
    }

    #[test]
    fn test_open_mesh_needs_both_probes_odd() {
        // One triangle in the x = 5 plane. From the origin the first default
        // probe crosses it near (5, 4.58, 0.42); the second passes at y < 0.
        let mesh = IndexedMesh::new(
            vec![
                Point3::new(5.0, 0.0, -1.0),
                Point3::new(5.0, 10.0, -1.0),
                Point3::new(5.0, 0.0, 5.0),
            ],
            vec![0, 1, 2],
        )
        .unwrap();
        let bvh = Bvh::build(&mesh).unwrap();
        assert!(std::ptr::eq(bvh.geometry(), &mesh));

        let [first, second] = bvh.settings().probe_directions();
        let point = Point3::origin();
        assert_eq!(bvh.intersect(&Ray::new(point, first)), 1);
        assert_eq!(bvh.intersect(&Ray::new(point, second)), 0);
        assert!(!bvh.is_inside(&point));
    }

    #[test]
    fn test_node_count_and_root_bounds() {
        let mesh = terrain(9);
        let bvh = Bvh::build(&mesh).unwrap();
        let n = mesh.triangle_count();
        assert_eq!(bvh.node_count(), 2 * n - 1);

        let expected = (0..n).fold(Aabb3::empty(), |acc, t| acc.union(&mesh.triangle_bounds(t)));
        assert_eq!(bvh.root_bounds(), Some(expected));
    }

    #[test]
    fn test_ordered_elements_is_permutation() {
        let mesh = terrain(7);
        let bvh = Bvh::build(&mesh).unwrap();
        let mut elements = bvh.ordered_elements().to_vec();
        elements.sort_unstable();
        let expected: Vec<u32> = (0..mesh.triangle_count() as u32).collect();
        assert_eq!(elements, expected);
    }

    #[test]
    fn test_bounds_nest_from_leaf_to_root() {
        let mesh = terrain(6);
        let bvh = Bvh::build(&mesh).unwrap();
        let nodes = bvh.nodes();
        for (i, node) in nodes.iter().enumerate() {
            match node.kind {
                LinearNodeKind::Interior {
                    second_child_offset,
                    ..
                } => {
                    assert!(node.bounds.contains(&nodes[i + 1].bounds));
                    assert!(node.bounds.contains(&nodes[second_child_offset as usize].bounds));
                }
                LinearNodeKind::Leaf {
                    elements_offset,
                    element_count,
                } => {
                    for &e in bvh.elements(elements_offset, element_count) {
                        assert!(node.bounds.contains(&mesh.triangle_bounds(e as usize)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_rebuild_is_structurally_equal() {
        let mesh = terrain(8);
        let a = Bvh::build(&mesh).unwrap();
        let b = Bvh::build(&mesh).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        assert_eq!(a.root_bounds(), b.root_bounds());
    }

    #[test]
    fn test_ray_missing_root_bounds() {
        let mesh = terrain(5);
        let bvh = Bvh::build(&mesh).unwrap();
        let ray = Ray::new(Point3::new(-10.0, -10.0, 50.0), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bvh.intersect(&ray), 0);
        assert!(bvh.nodes_hit(&ray).is_empty());
        assert!(!bvh.is_inside(&Point3::new(100.0, 100.0, 100.0)));
    }

    #[test]
    fn test_matches_brute_force() {
        let mesh = terrain(12);
        let bvh = Bvh::build(&mesh).unwrap();
        let mut seed = 7;
        for _ in 0..300 {
            let origin = Point3::new(
                lcg(&mut seed) * 16.0 - 2.0,
                lcg(&mut seed) * 16.0 - 2.0,
                lcg(&mut seed) * 6.0 - 3.0,
            );
            let dir = Vec3::new(
                lcg(&mut seed) - 0.5,
                lcg(&mut seed) - 0.5,
                lcg(&mut seed) - 0.5,
            );
            let ray = Ray::new(origin, dir);
            assert_eq!(bvh.intersect(&ray), brute_force_count(&mesh, &ray));
        }
    }

    #[test]
    fn test_rotated_mesh_matches_brute_force() {
        let mesh = terrain(8).with_transform(
            Transform::translation(3.0, -2.0, 1.0).then(&Transform::rotation_z(0.6)),
        );
        let bvh = Bvh::build(&mesh).unwrap();
        let mut seed = 21;
        for _ in 0..200 {
            let origin = Point3::new(
                lcg(&mut seed) * 14.0 - 4.0,
                lcg(&mut seed) * 14.0 - 4.0,
                lcg(&mut seed) * 6.0 - 2.0,
            );
            let dir = Vec3::new(
                lcg(&mut seed) - 0.5,
                lcg(&mut seed) - 0.5,
                lcg(&mut seed) - 0.5,
            );
            let ray = Ray::new(origin, dir);
            assert_eq!(bvh.intersect(&ray), brute_force_count(&mesh, &ray));
        }
    }

    #[test]
    fn test_axis_parallel_rays() {
        let mesh = box_row(5);
        let bvh = Bvh::build(&mesh).unwrap();

        // Along +x through every box: two faces each.
        let along = Ray::new(Point3::new(-1.0, 0.4, 0.6), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bvh.intersect(&along), 10);

        // Along -x from the far end.
        let back = Ray::new(Point3::new(20.0, 0.4, 0.6), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(bvh.intersect(&back), 10);

        // Straight down through the third box only.
        let down = Ray::new(Point3::new(6.5, 0.4, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bvh.intersect(&down), 2);

        // Down through a gap between boxes.
        let gap = Ray::new(Point3::new(2.0, 0.4, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(bvh.intersect(&gap), 0);
    }

    #[test]
    fn test_transformed_mesh() {
        let mesh = unit_cube().with_transform(
            Transform::translation(10.0, 0.0, 0.0).then(&Transform::scale(2.0, 2.0, 2.0)),
        );
        let bvh = Bvh::build(&mesh).unwrap();
        // World box spans x in [9, 11].
        assert!(bvh.is_inside(&Point3::new(10.0, 0.0, 0.0)));
        assert!(bvh.is_inside(&Point3::new(10.8, 0.8, -0.8)));
        assert!(!bvh.is_inside(&Point3::origin()));

        let ray = Ray::new(Point3::new(0.0, 0.3, 0.2), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bvh.intersect(&ray), 2);
        let hit = bvh.intersect_closest(&ray).unwrap();
        assert_relative_eq!(hit.t, 9.0, epsilon = 1e-9);
        assert_relative_eq!(hit.point, Point3::new(9.0, 0.3, 0.2), epsilon = 1e-9);

        let world = bvh.world_bounds(0);
        assert_relative_eq!(world.min, Point3::new(9.0, -1.0, -1.0), epsilon = 1e-12);
        assert_relative_eq!(world.max, Point3::new(11.0, 1.0, 1.0), epsilon = 1e-12);
        assert!(world.contains_point(&Point3::new(10.0, 0.0, 0.0)));
        assert!(!world.contains_point(&Point3::origin()));
    }

    #[test]
    fn test_singular_transform_fails() {
        let mesh = unit_cube().with_transform(Transform::scale(1.0, 1.0, 0.0));
        assert!(matches!(
            Bvh::build(&mesh),
            Err(BvhError::SingularTransform)
        ));
    }

    #[test]
    fn test_invalid_settings_fail() {
        let mesh = unit_cube();
        let settings = BvhSettings {
            triangle_epsilon: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            Bvh::build_with(&mesh, settings),
            Err(BvhError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_closest_hit_picks_nearest_box() {
        let mesh = box_row(4);
        let bvh = Bvh::build(&mesh).unwrap();

        let forward = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(1.0, 0.02, 0.03));
        let hit = bvh.intersect_closest(&forward).unwrap();
        assert_relative_eq!(hit.point.x, 0.0, epsilon = 1e-9);
        assert!(hit.triangle < 12);

        let backward = Ray::new(Point3::new(30.0, 0.5, 0.5), Vec3::new(-1.0, 0.005, -0.01));
        let hit = bvh.intersect_closest(&backward).unwrap();
        assert_relative_eq!(hit.point.x, 10.0, epsilon = 1e-9);
        assert!(hit.triangle >= 36);
    }

    #[test]
    fn test_closest_hit_matches_brute_force_minimum() {
        let mesh = terrain(10);
        let bvh = Bvh::build(&mesh).unwrap();
        let mut seed = 99;
        for _ in 0..200 {
            let origin = Point3::new(lcg(&mut seed) * 10.0, lcg(&mut seed) * 10.0, 5.0);
            let dir = Vec3::new(lcg(&mut seed) - 0.5, lcg(&mut seed) - 0.5, -1.0);
            let ray = Ray::new(origin, dir);

            let best = (0..mesh.triangle_count())
                .filter_map(|t| {
                    let [a, b, c] = mesh.triangle(t);
                    intersect_triangle(&ray, &a, &b, &c, 1e-9)
                })
                .fold(f64::INFINITY, f64::min);

            match bvh.intersect_closest(&ray) {
                Some(hit) => assert_relative_eq!(hit.t, best, epsilon = 1e-12),
                None => assert!(best.is_infinite()),
            }
        }
    }

    #[test]
    fn test_nodes_hit_is_preorder_path() {
        let mesh = box_row(8);
        let bvh = Bvh::build(&mesh).unwrap();
        let ray = Ray::new(Point3::new(9.5, 0.5, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let visited = bvh.nodes_hit(&ray);
        assert_eq!(visited.first(), Some(&0));
        assert!(visited.windows(2).all(|w| w[0] < w[1]));
        // Only leaves of the box at x = 9..10 can be reached.
        let leaves: Vec<_> = visited
            .iter()
            .filter(|&&i| bvh.nodes()[i].is_leaf())
            .collect();
        assert!(!leaves.is_empty());
        for &&leaf in &leaves {
            assert!(ray.hits_aabb(&bvh.world_bounds(leaf)));
        }
    }

    #[test]
    fn test_batch_matches_serial() {
        let mesh = terrain(8);
        let bvh = Bvh::build(&mesh).unwrap();
        let mut seed = 3;
        let rays: Vec<Ray> = (0..64)
            .map(|_| {
                Ray::new(
                    Point3::new(lcg(&mut seed) * 8.0, lcg(&mut seed) * 8.0, 4.0),
                    Vec3::new(0.1, -0.2, -1.0),
                )
            })
            .collect();
        let batch = bvh.intersect_batch(&rays);
        let serial: Vec<u32> = rays.iter().map(|r| bvh.intersect(r)).collect();
        assert_eq!(batch, serial);
    }

    #[test]
    fn test_custom_probes() {
        let mesh = unit_cube();
        let settings = BvhSettings {
            containment_probes: [[0.3, 0.9, -1.4], [-1.1, 0.2, 0.7]],
            ..Default::default()
        };
        let bvh = Bvh::build_with(&mesh, settings).unwrap();
        assert!(bvh.is_inside(&Point3::new(0.1, -0.2, 0.3)));
        assert!(!bvh.is_inside(&Point3::new(0.1, -0.2, 1.3)));
    }

    #[test]
    fn test_traversal_stack() {
        let mut stack = TraversalStack::new();
        assert_eq!(stack.pop(), None);
        stack.push(4);
        stack.push(9);
        assert_eq!(stack.pop(), Some(9));
        assert_eq!(stack.pop(), Some(4));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "bvh traversal stack overflow")]
    fn test_traversal_stack_overflow_panics() {
        let mut stack = TraversalStack::new();
        for node in 0..=MAX_TRAVERSAL_DEPTH {
            stack.push(node);
        }
    }
}
