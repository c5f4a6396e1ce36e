//! The authoritative forest and its persistence contract.
//!
//! [`TreeManager`] owns the [`NodeStore`] and the selected storage backend.
//! Every mutation runs inside one critical section: the node is inserted
//! provisionally, the whole snapshot is encoded and saved, and the insertion
//! is reverted if either step fails. In-memory state therefore never runs
//! ahead of what has been durably persisted.
//!
//! The critical section runs on its own task. A caller that stops waiting
//! (a dropped HTTP connection, a timeout) does not interrupt a save that has
//! started, so the commit or the rollback always happens.

mod store;

pub use store::NodeStore;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::codec;
use crate::error::{StartupError, TreeError};
use crate::models::{Node, NodeId, TreeView};
use crate::storage::{Health, StorageBackend};

/// Counts reported by [`TreeManager::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForestStats {
    pub nodes: usize,
    pub roots: usize,
    pub next_id: NodeId,
}

pub struct TreeManager {
    store: Arc<Mutex<NodeStore>>,
    storage: Arc<dyn StorageBackend>,
}

impl TreeManager {
    /// Load the latest snapshot from `storage` and build the store from it.
    ///
    /// An empty backend yields an empty forest. Any load or decode failure is
    /// fatal: the caller must not serve from unknown state.
    pub async fn hydrate(storage: Arc<dyn StorageBackend>) -> Result<Self, StartupError> {
        let store = match storage.load().await.map_err(StartupError::Load)? {
            None => {
                tracing::info!("No existing snapshot, starting with an empty forest");
                NodeStore::new()
            }
            Some(bytes) => {
                let state = codec::decode(&bytes)?;
                tracing::info!(
                    nodes = state.nodes.len(),
                    next_id = state.next_id,
                    "Loaded snapshot"
                );
                NodeStore::from_state(state)
            }
        };

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            storage,
        })
    }

    /// Create a node as a new root or under `parent_id`, and persist it.
    ///
    /// On any failure the store is left exactly as before the call, so the
    /// next successful create receives the same id.
    pub async fn create_node(
        &self,
        label: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Result<Node, TreeError> {
        let label = label.into();
        let store = Arc::clone(&self.store);
        let storage = Arc::clone(&self.storage);

        tokio::spawn(async move { commit(&store, storage.as_ref(), label, parent_id).await })
            .await
            .map_err(|e| {
                tracing::error!("Node creation task failed: {}", e);
                TreeError::Aborted(e.to_string())
            })?
    }

    /// Nested view of every tree, roots and children in creation order.
    pub async fn list_trees(&self) -> Vec<TreeView> {
        self.store.lock().await.forest()
    }

    pub async fn stats(&self) -> ForestStats {
        let store = self.store.lock().await;
        ForestStats {
            nodes: store.len(),
            roots: store.root_count(),
            next_id: store.next_id(),
        }
    }

    /// Probe the backend. Does not touch the forest or wait on mutations.
    pub async fn storage_health(&self) -> Health {
        self.storage.health().await
    }
}

async fn commit(
    store: &Mutex<NodeStore>,
    storage: &dyn StorageBackend,
    label: String,
    parent_id: Option<NodeId>,
) -> Result<Node, TreeError> {
    let mut store = store.lock().await;

    let node = store.insert(label, parent_id).inspect_err(|e| {
        tracing::warn!("Rejected node creation: {}", e);
    })?;

    if let Err(e) = persist(storage, &store).await {
        store.revert_last();
        tracing::error!(id = node.id, "Rolled back node creation: {}", e);
        return Err(e);
    }

    match node.parent_id {
        Some(parent_id) => tracing::info!(
            id = node.id,
            parent_id,
            label = %node.label,
            "Created child node"
        ),
        None => tracing::info!(id = node.id, label = %node.label, "Created root node"),
    }
    Ok(node)
}

async fn persist(storage: &dyn StorageBackend, store: &NodeStore) -> Result<(), TreeError> {
    let payload = codec::encode(store.snapshot())?;
    tracing::debug!(bytes = payload.len(), "Saving snapshot");
    storage.save(&payload).await?;
    Ok(())
}
