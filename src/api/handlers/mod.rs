use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::error::TreeError;
use crate::models::*;
use crate::tree::TreeManager;

type AppState = State<Arc<TreeManager>>;

// ============================================================
// Error Handling
// ============================================================

/// Map a tree error to a response.
///
/// Client errors are returned as-is. Anything else is logged in full and
/// reported to the client as a generic failure, so backend details do not
/// leak.
fn tree_error(e: TreeError) -> (StatusCode, String) {
    match e {
        TreeError::InvalidLabel => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        TreeError::ParentNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        TreeError::Encode(_)
        | TreeError::Storage(_)
        | TreeError::IdsExhausted(_)
        | TreeError::Aborted(_) => {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save data to storage".to_string(),
            )
        }
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(tree): AppState) -> impl IntoResponse {
    let health = tree.storage_health().await;
    if health.healthy {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "healthy", "storage": "available" })),
        )
    } else {
        tracing::warn!("Health check failed: {}", health.detail);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unhealthy", "storage": "unavailable" })),
        )
    }
}

// ============================================================
// Trees
// ============================================================

pub async fn list_trees(State(tree): AppState) -> Json<Vec<TreeView>> {
    let trees = tree.list_trees().await;
    tracing::debug!("Retrieved {} trees", trees.len());
    Json(trees)
}

pub async fn create_node(
    State(tree): AppState,
    Json(input): Json<CreateNodeInput>,
) -> Result<(StatusCode, Json<Node>), (StatusCode, String)> {
    tree.create_node(input.label, input.parent_id)
        .await
        .map(|node| (StatusCode::CREATED, Json(node)))
        .map_err(tree_error)
}
