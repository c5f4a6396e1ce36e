mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::tree::TreeManager;

pub fn create_router(tree: Arc<TreeManager>) -> Router {
    let api = Router::new().route(
        "/tree",
        get(handlers::list_trees).post(handlers::create_node),
    );

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(tree)
}
