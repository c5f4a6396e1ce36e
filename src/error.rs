//! Error taxonomy for tree operations, snapshot decoding, and startup.

use thiserror::Error;

use crate::models::NodeId;
use crate::storage::StorageError;

/// Errors returned by [`TreeManager`](crate::tree::TreeManager) mutations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("label must not be empty")]
    InvalidLabel,

    #[error("parent node with id {0} not found")]
    ParentNotFound(NodeId),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to persist snapshot: {0}")]
    Storage(#[from] StorageError),

    #[error("node ids exhausted at {0}")]
    IdsExhausted(NodeId),

    #[error("node creation aborted: {0}")]
    Aborted(String),
}

impl TreeError {
    /// Whether the error was caused by the caller's input rather than the
    /// service. Client errors never change state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidLabel | Self::ParentNotFound(_))
    }
}

/// A snapshot that cannot be parsed or breaks a structural invariant.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("snapshot must carry exactly one of `nodes` or `trees`")]
    UnknownLayout,

    #[error("node id must be positive")]
    InvalidId,

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node {0} has an empty label")]
    EmptyLabel(NodeId),

    #[error("node {id} references unknown parent {parent_id}")]
    UnknownParent { id: NodeId, parent_id: NodeId },

    #[error("node {id} references parent {parent_id} which is not created before it")]
    ParentNotEarlier { id: NodeId, parent_id: NodeId },

    #[error("next_id {next_id} must be greater than every node id (max {max_id})")]
    NextIdTooSmall { next_id: NodeId, max_id: NodeId },
}

/// Hydration failed; the process must not serve.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load snapshot: {0}")]
    Load(#[source] StorageError),

    #[error("stored snapshot is invalid: {0}")]
    Decode(#[from] DecodeError),
}
