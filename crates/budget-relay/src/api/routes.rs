//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Push delivery
        .route("/", post(handlers::receive_push))
        .route("/pubsub/push", post(handlers::receive_push))

        // Throttle status
        .route("/api/v1/throttle", get(handlers::throttle_status))

        .with_state(state)
}
