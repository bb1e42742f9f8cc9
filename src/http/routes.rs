use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/api/start", post(handlers::start_recording))
        .route("/api/stop", post(handlers::stop_recording))
        // Queries
        .route("/api/status", get(handlers::get_status))
        .route("/api/settings", get(handlers::get_settings))
        // The recorder UI is served from a different origin
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
