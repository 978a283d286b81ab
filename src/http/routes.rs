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
        .route("/recorder/start", post(handlers::start_recording))
        .route("/recorder/stop", post(handlers::stop_recording))
        .route("/recorder/reset", post(handlers::reset_recording))
        // Recorder queries
        .route("/recorder/status", get(handlers::get_status))
        .route("/recorder/frame", get(handlers::get_frame))
        .route("/recorder/artifact", get(handlers::get_artifact))
        // Handoff to the voice-cloning service
        .route("/synthesize", post(handlers::synthesize))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
