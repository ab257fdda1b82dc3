//! XmlTree: arena representation of an ordered, rooted XML-like document.
//!
//! Every node receives a stable `NodeId` when it is added; parent/child
//! relations are plain integer tables. Trees are built top-down through
//! `add_child`, so a node always has exactly one parent and the structure
//! cannot contain cycles.

use serde::{Deserialize, Serialize};

// ─── Types ────────────────────────────────────────────────────────

/// Stable arena id of a node within one `XmlTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A single element: tag, attributes in document order, optional text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XmlNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    children: Vec<NodeId>,
}

impl XmlNode {
    pub fn new(tag: impl Into<String>) -> Self {
        XmlNode {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Child ids in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Ordered rooted tree stored as a node arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlTree {
    nodes: Vec<XmlNode>,
    root: NodeId,
}

impl XmlTree {
    /// Create a tree holding only `root`.
    pub fn new(root: XmlNode) -> Self {
        let mut root = root;
        root.children.clear();
        XmlTree {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append `node` as the last child of `parent` and return its id.
    ///
    /// Any children already listed on `node` are discarded; descendants are
    /// attached through further `add_child` calls.
    pub fn add_child(&mut self, parent: NodeId, node: XmlNode) -> NodeId {
        let mut node = node;
        node.children.clear();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &XmlNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order (document order) traversal starting at the root.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root],
        }
    }
}

/// Ancestor-first, left-to-right traversal over an `XmlTree`.
pub struct PreOrder<'a> {
    tree: &'a XmlTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
