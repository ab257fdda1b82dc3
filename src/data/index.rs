//! Tree indexer: dense per-tree node indices and parent/child adjacency.
//!
//! Indices are assigned in pre-order, so the root is always index 0 and a
//! parent's index is always smaller than any of its children's. The
//! adjacency table is keyed by node index and is the only structural input
//! the propagator and decoder see.

use serde::{Deserialize, Serialize};

use super::tree::{NodeId, XmlTree};

// ─── Types ────────────────────────────────────────────────────────

/// Parent index and ordered child indices of one node.
///
/// The root is its own parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyRecord {
    pub parent: usize,
    pub children: Vec<usize>,
}

impl AdjacencyRecord {
    fn new(parent: usize) -> Self {
        AdjacencyRecord {
            parent,
            children: Vec::new(),
        }
    }
}

/// Index maps and adjacency for a single tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeIndex {
    /// Arena id → dense index (None for arena slots unreachable from root).
    node_index: Vec<Option<usize>>,
    /// Arena id → parent arena id. The root maps to itself.
    node_parent: Vec<Option<NodeId>>,
    /// Dense index → arena id.
    order: Vec<NodeId>,
    /// Dense index → adjacency record.
    adjacency: Vec<AdjacencyRecord>,
}

impl TreeIndex {
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Dense index of an arena node.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.node_index.get(id.0).copied().flatten()
    }

    /// Parent of an arena node; the root is its own parent.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_parent.get(id.0).copied().flatten()
    }

    /// Arena id of the node at a dense index.
    pub fn node_at(&self, index: usize) -> NodeId {
        self.order[index]
    }

    /// Arena ids in index order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.order
    }

    pub fn adjacency(&self) -> &[AdjacencyRecord] {
        &self.adjacency
    }

    /// Neighbor set of a node: its parent (except for the root) followed by
    /// its children in document order.
    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let record = &self.adjacency[index];
        let parent = (record.parent != index).then_some(record.parent);
        parent.into_iter().chain(record.children.iter().copied())
    }
}

/// Index maps for every tree of a batch. Tree `i` of the input slice is
/// entry `i` here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchIndex {
    trees: Vec<TreeIndex>,
}

impl BatchIndex {
    pub fn trees(&self) -> &[TreeIndex] {
        &self.trees
    }

    pub fn tree(&self, tree: usize) -> &TreeIndex {
        &self.trees[tree]
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Largest node count across the batch.
    pub fn max_node_count(&self) -> usize {
        self.trees.iter().map(TreeIndex::node_count).max().unwrap_or(0)
    }
}

// ─── Indexing ─────────────────────────────────────────────────────

/// Assign dense pre-order indices and build the adjacency table of `tree`.
pub fn index_tree(tree: &XmlTree) -> TreeIndex {
    let mut node_index = vec![None; tree.len()];
    let mut node_parent = vec![None; tree.len()];
    let mut order = Vec::with_capacity(tree.len());

    for (index, id) in tree.iter().enumerate() {
        node_index[id.0] = Some(index);
        order.push(id);
    }

    // Every entry starts as a self-parented record; the root keeps it.
    let mut adjacency: Vec<AdjacencyRecord> =
        (0..order.len()).map(AdjacencyRecord::new).collect();
    node_parent[tree.root().0] = Some(tree.root());

    // Pre-order guarantees a child's record is created (by its parent)
    // before the traversal reaches the child itself.
    for (index, &id) in order.iter().enumerate() {
        for &child in tree.children(id) {
            let Some(child_index) = node_index[child.0] else {
                continue;
            };
            node_parent[child.0] = Some(id);
            adjacency[child_index] = AdjacencyRecord::new(index);
            adjacency[index].children.push(child_index);
        }
    }

    TreeIndex {
        node_index,
        node_parent,
        order,
        adjacency,
    }
}

/// Index every tree of a batch independently.
pub fn index_batch(trees: &[XmlTree]) -> BatchIndex {
    BatchIndex {
        trees: trees.iter().map(index_tree).collect(),
    }
}

// ─── Tests ────────────────────────────────────────────────────────
