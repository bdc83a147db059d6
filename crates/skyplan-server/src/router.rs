//! Axum router setup for the Skyplan server

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{handlers::*, ServerState};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Document
        .route("/api/design", get(get_design))
        .route("/api/design/name", put(rename_design))
        .route("/api/design/language", put(set_language))
        .route("/api/design/clear", post(clear_design))
        .route("/api/design/saved", post(mark_saved))
        .route("/api/hierarchy", get(get_hierarchy))
        // Nodes
        .route("/api/nodes", post(create_node))
        .route("/api/changes/nodes", post(apply_node_changes))
        .route("/api/nodes/:id", axum::routing::delete(delete_node))
        .route("/api/nodes/:id/data", patch(update_node_data))
        .route("/api/nodes/:id/properties/:key", put(set_node_property))
        .route("/api/nodes/:id/parent", put(set_node_parent))
        // Edges
        .route("/api/edges", post(create_edge))
        .route("/api/changes/edges", post(apply_edge_changes))
        .route("/api/selection", post(select_node))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyplan_core::DesignEngine;

    #[test]
    fn test_router_creation() {
        let state = Arc::new(ServerState::new(DesignEngine::new()));
        let _router = create_router(Arc::clone(&state));
        let engine = tokio_test::block_on(state.engine.read());
        assert!(engine.graph().is_empty());
    }
}
