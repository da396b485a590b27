//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Resorts
        .route("/resorts", get(handlers::list_resorts))
        .route("/alta", get(handlers::alta_status))
        .route("/trailmap/:resort", get(handlers::trail_map))
        .route("/:resort", get(handlers::resort_status))

        .with_state(state)
}
