//! Snapshot encoding.
//!
//! The wire format is compact JSON:
//!
//! ```text
//! {"next_id":3,"nodes":[{"id":1,"label":"root","parent_id":null},{"id":2,"label":"child","parent_id":1}]}
//! ```
//!
//! Decoding never trusts the payload. Every structural invariant is checked
//! again, because the bytes may come from another build or a damaged object.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::DecodeError;
use crate::models::{Node, NodeId, TreeState};

/// Encode a snapshot. Encoding the same state always yields the same bytes.
pub fn encode(state: &TreeState) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(state)
}

/// Decode and validate a snapshot.
///
/// Legacy snapshots nest one JSON level per tree level, so parsing runs
/// without serde_json's depth limit and grows the stack on demand.
pub fn decode(bytes: &[u8]) -> Result<TreeState, DecodeError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let snapshot = Snapshot::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;

    let state = match snapshot {
        Snapshot {
            next_id,
            nodes: Some(nodes),
            trees: None,
        } => TreeState { next_id, nodes },
        Snapshot {
            next_id,
            nodes: None,
            trees: Some(trees),
        } => flatten_legacy(next_id, trees),
        _ => return Err(DecodeError::UnknownLayout),
    };
    validate(&state)?;
    Ok(state)
}

/// Check every invariant a snapshot must satisfy.
pub fn validate(state: &TreeState) -> Result<(), DecodeError> {
    // id -> position in creation order
    let mut positions: HashMap<NodeId, usize> = HashMap::with_capacity(state.nodes.len());
    for (position, node) in state.nodes.iter().enumerate() {
        if node.id == 0 {
            return Err(DecodeError::InvalidId);
        }
        if node.label.is_empty() {
            return Err(DecodeError::EmptyLabel(node.id));
        }
        if positions.insert(node.id, position).is_some() {
            return Err(DecodeError::DuplicateId(node.id));
        }
    }

    for (position, node) in state.nodes.iter().enumerate() {
        let Some(parent_id) = node.parent_id else {
            continue;
        };
        match positions.get(&parent_id) {
            None => {
                return Err(DecodeError::UnknownParent {
                    id: node.id,
                    parent_id,
                })
            }
            Some(&parent_position) if parent_position >= position => {
                return Err(DecodeError::ParentNotEarlier {
                    id: node.id,
                    parent_id,
                })
            }
            Some(_) => {}
        }
    }

    let max_id = state.nodes.iter().map(|n| n.id).max().unwrap_or(0);
    if state.next_id <= max_id {
        return Err(DecodeError::NextIdTooSmall {
            next_id: state.next_id,
            max_id,
        });
    }

    Ok(())
}

/// Either layout: current snapshots carry `nodes`, the nested layout written
/// by earlier releases carries `trees`.
#[derive(Deserialize)]
struct Snapshot {
    next_id: NodeId,
    #[serde(default)]
    nodes: Option<Vec<Node>>,
    #[serde(default)]
    trees: Option<Vec<LegacyNode>>,
}

#[derive(Deserialize)]
struct LegacyNode {
    id: NodeId,
    label: String,
    #[serde(default)]
    children: Vec<LegacyNode>,
}

/// Flatten nested trees into creation order. Ids were handed out in creation
/// order, so sorting by id recovers it.
fn flatten_legacy(next_id: NodeId, trees: Vec<LegacyNode>) -> TreeState {
    let mut nodes = Vec::new();
    let mut pending: Vec<(LegacyNode, Option<NodeId>)> =
        trees.into_iter().rev().map(|n| (n, None)).collect();

    while let Some((legacy, parent_id)) = pending.pop() {
        let id = legacy.id;
        pending.extend(legacy.children.into_iter().rev().map(|c| (c, Some(id))));
        nodes.push(Node {
            id,
            label: legacy.label,
            parent_id,
        });
    }

    nodes.sort_by_key(|n| n.id);
    TreeState { next_id, nodes }
}
