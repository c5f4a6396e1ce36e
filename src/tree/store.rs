use std::collections::HashMap;

use crate::error::TreeError;
use crate::models::{Node, NodeId, TreeState, TreeView};

/// In-memory index of the forest.
///
/// Nodes are kept in creation order inside a [`TreeState`] so a snapshot can
/// be encoded without copying. Two indexes sit on top of it: id -> position,
/// and parent -> children (with `None` as the parent of every root).
#[derive(Debug)]
pub struct NodeStore {
    state: TreeState,
    positions: HashMap<NodeId, usize>,
    children: HashMap<Option<NodeId>, Vec<NodeId>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::from_state(TreeState::empty())
    }

    /// Build the indexes for an already validated snapshot.
    pub fn from_state(state: TreeState) -> Self {
        let mut positions = HashMap::with_capacity(state.nodes.len());
        let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
        for (position, node) in state.nodes.iter().enumerate() {
            positions.insert(node.id, position);
            children.entry(node.parent_id).or_default().push(node.id);
        }
        Self {
            state,
            positions,
            children,
        }
    }

    pub fn snapshot(&self) -> &TreeState {
        &self.state
    }

    pub fn next_id(&self) -> NodeId {
        self.state.next_id
    }

    pub fn len(&self) -> usize {
        self.state.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.positions.get(&id).map(|&p| &self.state.nodes[p])
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Ids of the direct children of `parent_id`, or of the roots for `None`.
    pub fn children_of(&self, parent_id: Option<NodeId>) -> &[NodeId] {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn root_count(&self) -> usize {
        self.children_of(None).len()
    }

    /// Allocate the next id and append a node.
    ///
    /// Nothing changes when validation fails, including the id counter. The
    /// counter must be able to advance past the new id.
    pub fn insert(&mut self, label: String, parent_id: Option<NodeId>) -> Result<Node, TreeError> {
        if label.is_empty() {
            return Err(TreeError::InvalidLabel);
        }
        if let Some(parent_id) = parent_id {
            if !self.contains(parent_id) {
                return Err(TreeError::ParentNotFound(parent_id));
            }
        }

        let id = self.state.next_id;
        let next_id = id.checked_add(1).ok_or(TreeError::IdsExhausted(id))?;

        let node = Node {
            id,
            label,
            parent_id,
        };
        self.state.next_id = next_id;
        self.positions.insert(node.id, self.state.nodes.len());
        self.children.entry(parent_id).or_default().push(node.id);
        self.state.nodes.push(node.clone());
        Ok(node)
    }

    /// Undo the most recent [`insert`](Self::insert).
    ///
    /// Returns the removed node, or `None` when the store is empty.
    pub fn revert_last(&mut self) -> Option<Node> {
        let node = self.state.nodes.pop()?;
        self.positions.remove(&node.id);
        if let Some(siblings) = self.children.get_mut(&node.parent_id) {
            debug_assert_eq!(siblings.last(), Some(&node.id));
            siblings.pop();
            if siblings.is_empty() {
                self.children.remove(&node.parent_id);
            }
        }
        self.state.next_id = node.id;
        Some(node)
    }

    /// Materialize the nested view of every tree, roots in creation order.
    ///
    /// Children are always created after their parent, so walking the nodes
    /// newest-first finishes every subtree before its parent is reached.
    pub fn forest(&self) -> Vec<TreeView> {
        let mut built: HashMap<NodeId, TreeView> = HashMap::with_capacity(self.len());
        for node in self.state.nodes.iter().rev() {
            let children = self.take_views(Some(node.id), &mut built);
            built.insert(
                node.id,
                TreeView {
                    id: node.id,
                    label: node.label.clone(),
                    children,
                },
            );
        }
        self.take_views(None, &mut built)
    }

    fn take_views(
        &self,
        parent_id: Option<NodeId>,
        built: &mut HashMap<NodeId, TreeView>,
    ) -> Vec<TreeView> {
        self.children_of(parent_id)
            .iter()
            .filter_map(|id| built.remove(id))
            .collect()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_with_counter_at_one() {
        let store = NodeStore::new();
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
        assert!(store.forest().is_empty());
    }

    #[test]
    fn insert_allocates_sequential_ids() {
        let mut store = NodeStore::new();
        let root = store.insert("root".into(), None).unwrap();
        let child = store.insert("child".into(), Some(root.id)).unwrap();

        assert_eq!(root.id, 1);
        assert_eq!(child.id, 2);
        assert_eq!(child.parent_id, Some(1));
        assert_eq!(store.next_id(), 3);
        assert_eq!(store.children_of(Some(1)), &[2]);
        assert_eq!(store.children_of(None), &[1]);
    }

    #[test]
    fn rejected_insert_leaves_counter_alone() {
        let mut store = NodeStore::new();
        assert!(matches!(
            store.insert("x".into(), Some(999)),
            Err(TreeError::ParentNotFound(999))
        ));
        assert!(matches!(
            store.insert(String::new(), None),
            Err(TreeError::InvalidLabel)
        ));
        assert_eq!(store.next_id(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn refuses_to_allocate_past_the_last_id() {
        let mut store = NodeStore::from_state(TreeState {
            next_id: NodeId::MAX,
            nodes: Vec::new(),
        });

        assert!(matches!(
            store.insert("last".into(), None),
            Err(TreeError::IdsExhausted(u64::MAX))
        ));
        assert_eq!(store.next_id(), NodeId::MAX);
        assert!(store.is_empty());
    }

    #[test]
    fn revert_last_restores_previous_state() {
        let mut store = NodeStore::new();
        let root = store.insert("root".into(), None).unwrap();
        let before = store.snapshot().clone();
        let forest_before = store.forest();

        store.insert("child".into(), Some(root.id)).unwrap();
        let reverted = store.revert_last().unwrap();

        assert_eq!(reverted.id, 2);
        assert_eq!(store.snapshot(), &before);
        assert_eq!(store.forest(), forest_before);
        assert!(!store.contains(2));
        assert!(store.children_of(Some(1)).is_empty());

        let again = store.insert("child".into(), Some(root.id)).unwrap();
        assert_eq!(again.id, 2);
    }

    #[test]
    fn forest_nests_children_in_creation_order() {
        let mut store = NodeStore::new();
        let a = store.insert("a".into(), None).unwrap();
        let b = store.insert("b".into(), None).unwrap();
        let a1 = store.insert("a1".into(), Some(a.id)).unwrap();
        store.insert("b1".into(), Some(b.id)).unwrap();
        store.insert("a2".into(), Some(a.id)).unwrap();
        store.insert("a1x".into(), Some(a1.id)).unwrap();

        let forest = store.forest();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].label, "a");
        let labels: Vec<_> = forest[0].children.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["a1", "a2"]);
        assert_eq!(forest[0].children[0].children[0].label, "a1x");
        assert_eq!(forest[1].children[0].label, "b1");
        assert_eq!(forest.iter().map(TreeView::size).sum::<usize>(), 6);
    }

    #[test]
    fn from_state_rebuilds_indexes() {
        let mut store = NodeStore::new();
        store.insert("root".into(), None).unwrap();
        store.insert("child".into(), Some(1)).unwrap();

        let rebuilt = NodeStore::from_state(store.snapshot().clone());
        assert_eq!(rebuilt.forest(), store.forest());
        assert_eq!(rebuilt.get(2).map(|n| n.label.as_str()), Some("child"));
        assert_eq!(rebuilt.next_id(), 3);
    }
}
