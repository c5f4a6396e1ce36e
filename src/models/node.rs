use serde::{Deserialize, Serialize};

/// Identifier allocated by the node store. Always positive.
pub type NodeId = u64;

/// A labeled node in the forest.
///
/// Nodes are never updated or removed once created. `parent_id` always refers
/// to a node that existed before this one, so following parent links from any
/// node terminates at a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub parent_id: Option<NodeId>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for creating a new node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodeInput {
    pub label: String,
    /// Parent node ID for nesting. `None` creates a new root.
    #[serde(default)]
    pub parent_id: Option<NodeId>,
}
