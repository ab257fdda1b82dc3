//! Padded batch layout: node slots, masks and the propagation edge list.
//!
//! Trees of different sizes share one `[batch, max_nodes, d]` tensor. Each
//! slot is tagged `Real` or `Padding`; masks are derived from those tags.
//! Rows of the flattened tensor are `tree * max_nodes + node`.

use burn::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

use super::index::BatchIndex;

// ─── Types ────────────────────────────────────────────────────────

/// State of one `(tree, slot)` position of the padded batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSlot {
    /// Holds the node with this dense index.
    Real(usize),
    /// Placeholder beyond the tree's node count.
    Padding,
}

/// Direction of a message along a tree edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Parent → child.
    FromParent,
    /// Child → parent.
    FromChild,
}

/// Directed message edge between two flattened rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src: usize,
    pub dst: usize,
    pub kind: MessageKind,
}

/// Edge list lowered to tensors for one forward pass.
pub struct EdgeTensors<B: Backend> {
    /// [E], source row per edge
    pub src: Tensor<B, 1, Int>,
    /// [E], destination row per edge
    pub dst: Tensor<B, 1, Int>,
    /// [E, 1], 1.0 for parent → child edges, 0.0 for child → parent
    pub from_parent: Tensor<B, 2>,
    /// [rows, 1], incoming edge count per row, at least 1
    pub in_degree: Tensor<B, 2>,
}

/// Slot tags and edges for a padded batch of trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLayout {
    num_trees: usize,
    max_nodes: usize,
    slots: Vec<NodeSlot>,
    edges: Vec<Edge>,
}

impl BatchLayout {
    /// Lay out `index` with `max_nodes` slots per tree.
    ///
    /// Nodes with index `>= max_nodes` are dropped together with their
    /// edges. Pre-order indexing makes the kept nodes a connected subtree.
    pub fn new(index: &BatchIndex, max_nodes: usize) -> Self {
        let num_trees = index.len();
        let mut slots = vec![NodeSlot::Padding; num_trees * max_nodes];
        for (t, tree) in index.trees().iter().enumerate() {
            let base = t * max_nodes;
            for i in 0..tree.node_count().min(max_nodes) {
                slots[base + i] = NodeSlot::Real(i);
            }
        }

        // One message per kept neighbor, parent first, then children.
        let mut edges = Vec::new();
        for (row, &slot) in slots.iter().enumerate() {
            let NodeSlot::Real(node) = slot else {
                continue;
            };
            let tree = index.tree(row / max_nodes);
            let base = row - node;
            let parent = tree.adjacency()[node].parent;
            for neighbor in tree.neighbors(node).filter(|&n| n < max_nodes) {
                let kind = if neighbor == parent {
                    MessageKind::FromParent
                } else {
                    MessageKind::FromChild
                };
                edges.push(Edge {
                    src: base + neighbor,
                    dst: row,
                    kind,
                });
            }
        }

        BatchLayout {
            num_trees,
            max_nodes,
            slots,
            edges,
        }
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Flattened row count: `num_trees * max_nodes`.
    pub fn num_rows(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, tree: usize, node: usize) -> NodeSlot {
        self.slots[tree * self.max_nodes + node]
    }

    pub fn slots(&self) -> &[NodeSlot] {
        &self.slots
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of real (non-padding) slots of a tree.
    pub fn real_node_count(&self, tree: usize) -> usize {
        let base = tree * self.max_nodes;
        self.slots[base..base + self.max_nodes]
            .iter()
            .filter(|s| matches!(s, NodeSlot::Real(_)))
            .count()
    }

    /// Incoming edge count per row.
    pub fn in_degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.num_rows()];
        for edge in &self.edges {
            degrees[edge.dst] += 1;
        }
        degrees
    }

    /// Reorder the edge list. Propagation results do not depend on edge
    /// order up to floating-point summation.
    pub fn shuffle_edges<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.edges.shuffle(rng);
    }

    /// [num_trees, max_nodes], 1.0 for real nodes, 0.0 for padding.
    pub fn node_mask<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let data: Vec<f32> = self
            .slots
            .iter()
            .map(|s| match s {
                NodeSlot::Real(_) => 1.0,
                NodeSlot::Padding => 0.0,
            })
            .collect();
        Tensor::from_data(
            TensorData::new(data, [self.num_trees, self.max_nodes]),
            device,
        )
    }

    /// [num_trees, max_nodes], true where the slot is padding.
    pub fn padding_mask<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Bool> {
        self.node_mask::<B>(device).lower_elem(0.5)
    }

    /// Lower the edge list to tensors. `None` when the batch has no edges
    /// (every tree is a lone root).
    pub fn edge_tensors<B: Backend>(&self, device: &B::Device) -> Option<EdgeTensors<B>> {
        if self.edges.is_empty() {
            return None;
        }
        let num_edges = self.edges.len();
        let src: Vec<i32> = self.edges.iter().map(|e| e.src as i32).collect();
        let dst: Vec<i32> = self.edges.iter().map(|e| e.dst as i32).collect();
        let from_parent: Vec<f32> = self
            .edges
            .iter()
            .map(|e| match e.kind {
                MessageKind::FromParent => 1.0,
                MessageKind::FromChild => 0.0,
            })
            .collect();
        let in_degree: Vec<f32> = self
            .in_degrees()
            .into_iter()
            .map(|d| d.max(1) as f32)
            .collect();

        Some(EdgeTensors {
            src: Tensor::from_data(TensorData::new(src, [num_edges]), device),
            dst: Tensor::from_data(TensorData::new(dst, [num_edges]), device),
            from_parent: Tensor::from_data(TensorData::new(from_parent, [num_edges, 1]), device),
            in_degree: Tensor::from_data(TensorData::new(in_degree, [self.num_rows(), 1]), device),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::index::index_batch;
    use crate::data::tree::{XmlNode, XmlTree};
    use burn::backend::NdArray;

    type B = NdArray;

    /// root(a(c), b)
    fn small_tree() -> XmlTree {
        let mut tree = XmlTree::new(XmlNode::new("root"));
        let a = tree.add_child(tree.root(), XmlNode::new("a"));
        tree.add_child(tree.root(), XmlNode::new("b"));
        tree.add_child(a, XmlNode::new("c"));
        tree
    }

    #[test]
    fn short_trees_are_padded() {
        let trees = vec![small_tree(), XmlTree::new(XmlNode::new("solo"))];
        let layout = BatchLayout::new(&index_batch(&trees), 5);

        assert_eq!(layout.num_rows(), 10);
        assert_eq!(layout.slot(0, 3), NodeSlot::Real(3));
        assert_eq!(layout.slot(0, 4), NodeSlot::Padding);
        assert_eq!(layout.slot(1, 0), NodeSlot::Real(0));
        assert_eq!(layout.slot(1, 1), NodeSlot::Padding);
        assert_eq!(layout.real_node_count(0), 4);
        assert_eq!(layout.real_node_count(1), 1);
    }

    #[test]
    fn edges_follow_index_neighbors() {
        let trees = vec![small_tree(), small_tree()];
        let index = index_batch(&trees);
        let layout = BatchLayout::new(&index, 5);
        for (row, slot) in layout.slots().iter().enumerate() {
            let incoming: Vec<usize> = layout
                .edges()
                .iter()
                .filter(|e| e.dst == row)
                .map(|e| e.src % 5)
                .collect();
            match *slot {
                NodeSlot::Real(node) => {
                    let expected: Vec<usize> = index.tree(row / 5).neighbors(node).collect();
                    assert_eq!(incoming, expected);
                }
                NodeSlot::Padding => assert!(incoming.is_empty()),
            }
        }
    }

    #[test]
    fn every_tree_edge_yields_two_messages() {
        let layout = BatchLayout::new(&index_batch(&[small_tree()]), 4);
        // 3 parent/child pairs, one message each way
        assert_eq!(layout.edges().len(), 6);
        let from_parent = layout
            .edges()
            .iter()
            .filter(|e| e.kind == MessageKind::FromParent)
            .count();
        assert_eq!(from_parent, 3);
        assert!(layout.edges().iter().all(|e| e.src != e.dst));
    }

    #[test]
    fn root_receives_only_child_messages() {
        let layout = BatchLayout::new(&index_batch(&[small_tree()]), 4);
        let into_root: Vec<&Edge> = layout.edges().iter().filter(|e| e.dst == 0).collect();
        assert_eq!(into_root.len(), 2);
        assert!(into_root.iter().all(|e| e.kind == MessageKind::FromChild));
        assert_eq!(layout.in_degrees(), vec![2, 2, 1, 1]);
    }

    #[test]
    fn edges_stay_inside_their_tree() {
        let trees = vec![small_tree(), small_tree()];
        let layout = BatchLayout::new(&index_batch(&trees), 6);
        for edge in layout.edges() {
            assert_eq!(edge.src / 6, edge.dst / 6);
        }
    }

    #[test]
    fn overlong_trees_are_truncated() {
        let layout = BatchLayout::new(&index_batch(&[small_tree()]), 2);
        // Only root and `a` survive; a single parent/child pair remains.
        assert_eq!(layout.real_node_count(0), 2);
        assert_eq!(layout.edges().len(), 2);
        assert!(layout.edges().iter().all(|e| e.src < 2 && e.dst < 2));
    }

    #[test]
    fn masks_follow_slot_tags() {
        let device = Default::default();
        let trees = vec![small_tree(), XmlTree::new(XmlNode::new("solo"))];
        let layout = BatchLayout::new(&index_batch(&trees), 4);

        let mask = layout.node_mask::<B>(&device).into_data();
        assert_eq!(
            mask.as_slice::<f32>().unwrap(),
            &[1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]
        );
        let padding = layout.padding_mask::<B>(&device).into_data();
        assert_eq!(
            padding.as_slice::<bool>().unwrap(),
            &[false, false, false, false, false, true, true, true]
        );
    }

    #[test]
    fn root_only_batch_has_no_edge_tensors() {
        let device = Default::default();
        let layout = BatchLayout::new(&index_batch(&[XmlTree::new(XmlNode::new("r"))]), 3);
        assert!(layout.edge_tensors::<B>(&device).is_none());
    }

    #[test]
    fn edge_tensors_shapes() {
        let device = Default::default();
        let layout = BatchLayout::new(&index_batch(&[small_tree()]), 4);
        let edges = layout.edge_tensors::<B>(&device).unwrap();
        assert_eq!(edges.src.dims(), [6]);
        assert_eq!(edges.dst.dims(), [6]);
        assert_eq!(edges.from_parent.dims(), [6, 1]);
        assert_eq!(edges.in_degree.dims(), [4, 1]);
    }
}
