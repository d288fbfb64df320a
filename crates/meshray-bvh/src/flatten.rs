//! Linearization of the build tree into a pre-order node array.

use meshray_math::Aabb3;

use crate::build::{BuildNodeKind, BuildTree};

/// Payload of a linear node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearNodeKind {
    /// Leaf over a contiguous range of the ordered element list.
    Leaf {
        /// Offset into the ordered element list.
        elements_offset: u32,
        /// Number of elements in the range.
        element_count: u32,
    },
    /// Interior node. The first child is the next array slot.
    Interior {
        /// Axis the children were partitioned on.
        split_axis: u8,
        /// Array index of the second child.
        second_child_offset: u32,
    },
}

/// One entry of the flattened BVH.
#[derive(Debug, Clone, Copy)]
pub struct LinearNode {
    /// Local-space bounds of the subtree.
    pub bounds: Aabb3,
    /// Leaf or interior payload.
    pub kind: LinearNodeKind,
}

impl LinearNode {
    /// True for leaf nodes.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, LinearNodeKind::Leaf { .. })
    }

    /// Element count, 0 for interior nodes.
    #[inline]
    pub fn element_count(&self) -> u32 {
        match self.kind {
            LinearNodeKind::Leaf { element_count, .. } => element_count,
            LinearNodeKind::Interior { .. } => 0,
        }
    }
}

/// Flatten `tree` into pre-order, so every interior node at `i` has its
/// first child at `i + 1`.
///
/// # Panics
///
/// If the walk produces a different number of nodes than the tree holds,
/// which means the tree is malformed.
pub fn flatten(tree: &BuildTree) -> Vec<LinearNode> {
    let Some(root) = tree.root() else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(tree.node_count());
    flatten_node(tree, root, &mut nodes);
    assert_eq!(
        nodes.len(),
        tree.node_count(),
        "flattened node count differs from build tree"
    );
    nodes
}

/// Append `node` and its subtree to `out`, returning the node's offset.
fn flatten_node(tree: &BuildTree, node: usize, out: &mut Vec<LinearNode>) -> u32 {
    let my_offset = out.len();
    let build = tree.nodes[node];

    match build.kind {
        BuildNodeKind::Leaf {
            first_element,
            element_count,
        } => {
            out.push(LinearNode {
                bounds: build.bounds,
                kind: LinearNodeKind::Leaf {
                    elements_offset: first_element,
                    element_count,
                },
            });
        }
        BuildNodeKind::Interior {
            split_axis,
            left,
            right,
        } => {
            // Reserve space for this node
            out.push(LinearNode {
                bounds: build.bounds,
                kind: LinearNodeKind::Interior {
                    split_axis,
                    second_child_offset: 0,
                },
            });

            flatten_node(tree, left, out);
            let second_child_offset = flatten_node(tree, right, out);

            out[my_offset].kind = LinearNodeKind::Interior {
                split_axis,
                second_child_offset,
            };
        }
    }

    my_offset as u32
}
