use serde::{Deserialize, Serialize};

use super::{Node, NodeId};

/// Full snapshot of the forest.
///
/// `nodes` is kept in creation order. Field order here is the field order of
/// the encoded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeState {
    pub next_id: NodeId,
    pub nodes: Vec<Node>,
}

impl TreeState {
    /// State of a store that has never created a node.
    pub fn empty() -> Self {
        Self {
            next_id: 1,
            nodes: Vec::new(),
        }
    }
}

impl Default for TreeState {
    fn default() -> Self {
        Self::empty()
    }
}

/// A node with its nested children, used for tree responses.
///
/// Children appear in the order they were created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeView {
    pub id: NodeId,
    pub label: String,
    pub children: Vec<TreeView>,
}

impl TreeView {
    /// Number of nodes in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeView::size).sum::<usize>()
    }
}
