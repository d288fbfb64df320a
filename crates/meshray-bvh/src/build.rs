//! BVH construction.
//!
//! Primitives are split recursively at the median centroid along the axis
//! of largest centroid spread. Every split lands on the range midpoint, so
//! the tree is balanced (depth `ceil(log2 n)`) even for degenerate input,
//! and every leaf holds exactly one primitive.

use meshray_math::{Aabb3, Point3};

use crate::geometry::GeometrySource;

/// One triangle as seen by the builder.
#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    /// Index of the triangle in its source mesh.
    pub original_index: u32,
    /// Bounds of the triangle's three vertices.
    pub bounds: Aabb3,
    /// Midpoint of `bounds`.
    pub centroid: Point3,
}

impl Primitive {
    /// Create a primitive; the centroid is taken from the bounds.
    pub fn new(original_index: u32, bounds: Aabb3) -> Self {
        Self {
            original_index,
            bounds,
            centroid: bounds.centroid(),
        }
    }
}

/// Gather one primitive per triangle of `geometry`.
///
/// The caller guarantees the triangle count fits in `u32`.
pub fn collect_primitives<G: GeometrySource + ?Sized>(geometry: &G) -> Vec<Primitive> {
    (0..geometry.triangle_count())
        .map(|i| Primitive::new(i as u32, geometry.triangle_bounds(i)))
        .collect()
}

/// Payload of a build node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildNodeKind {
    /// Leaf over `ordered_elements[first_element..first_element + element_count]`.
    Leaf {
        /// Offset into the ordered element list.
        first_element: u32,
        /// Number of elements (always 1 for this builder).
        element_count: u32,
    },
    /// Interior node; children are arena indices.
    Interior {
        /// Axis the children were partitioned on.
        split_axis: u8,
        /// Left child (lower centroids on `split_axis`).
        left: usize,
        /// Right child.
        right: usize,
    },
}

/// A node of the intermediate build tree.
#[derive(Debug, Clone, Copy)]
pub struct BuildNode {
    /// Union of the bounds of everything below this node.
    pub bounds: Aabb3,
    /// Leaf or interior payload.
    pub kind: BuildNodeKind,
}

/// Arena-backed build tree. The root, when present, is node 0.
#[derive(Debug, Clone, Default)]
pub struct BuildTree {
    /// All nodes; children always have larger indices than their parent.
    pub nodes: Vec<BuildNode>,
    /// Permutation of original triangle indices, grouped per leaf.
    pub ordered_elements: Vec<u32>,
}

impl BuildTree {
    /// Index of the root node, `None` for an empty tree.
    pub fn root(&self) -> Option<usize> {
        (!self.nodes.is_empty()).then_some(0)
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of levels (0 for an empty tree, 1 for a lone leaf).
    pub fn depth(&self) -> usize {
        match self.root() {
            Some(root) => self.depth_from(root),
            None => 0,
        }
    }

    fn depth_from(&self, node: usize) -> usize {
        match self.nodes[node].kind {
            BuildNodeKind::Leaf { .. } => 1,
            BuildNodeKind::Interior { left, right, .. } => {
                1 + self.depth_from(left).max(self.depth_from(right))
            }
        }
    }
}

/// Build a tree over `primitives`, reordering them in place.
///
/// An empty slice yields an empty tree without recursing.
pub fn build_tree(primitives: &mut [Primitive]) -> BuildTree {
    if primitives.is_empty() {
        return BuildTree::default();
    }

    let n = primitives.len();
    let mut builder = Builder {
        primitives,
        tree: BuildTree {
            // A binary tree with one primitive per leaf has 2n - 1 nodes.
            nodes: Vec::with_capacity(2 * n - 1),
            ordered_elements: Vec::with_capacity(n),
        },
    };
    builder.recursive_build(0, n);
    builder.tree
}

struct Builder<'p> {
    primitives: &'p mut [Primitive],
    tree: BuildTree,
}

impl Builder<'_> {
    /// Build the subtree over `primitives[start..end]` and return its arena index.
    fn recursive_build(&mut self, start: usize, end: usize) -> usize {
        let range = &self.primitives[start..end];
        let bounds = range
            .iter()
            .fold(Aabb3::empty(), |acc, p| acc.union(&p.bounds));

        if end - start == 1 {
            let first_element = self.tree.ordered_elements.len() as u32;
            self.tree
                .ordered_elements
                .push(self.primitives[start].original_index);
            return self.push(BuildNode {
                bounds,
                kind: BuildNodeKind::Leaf {
                    first_element,
                    element_count: 1,
                },
            });
        }

        let mut centroid_bounds = Aabb3::empty();
        for p in range {
            centroid_bounds.include_point(&p.centroid);
        }
        let axis = centroid_bounds.max_extent();
        let mid = (start + end) / 2;

        if centroid_bounds.max[axis] == centroid_bounds.min[axis] {
            // All centroids coincide: ordering is meaningless, split by count.
            tracing::trace!(start, end, "coincident centroids, splitting at midpoint");
        } else {
            self.primitives[start..end].select_nth_unstable_by(mid - start, |a, b| {
                a.centroid[axis].total_cmp(&b.centroid[axis])
            });
        }

        // Reserve the slot first so children get larger indices.
        let node = self.push(BuildNode {
            bounds,
            kind: BuildNodeKind::Interior {
                split_axis: axis as u8,
                left: 0,
                right: 0,
            },
        });
        let left = self.recursive_build(start, mid);
        let right = self.recursive_build(mid, end);
        self.tree.nodes[node].kind = BuildNodeKind::Interior {
            split_axis: axis as u8,
            left,
            right,
        };
        node
    }

    fn push(&mut self, node: BuildNode) -> usize {
        self.tree.nodes.push(node);
        self.tree.nodes.len() - 1
    }
}
