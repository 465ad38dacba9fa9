//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Manual triggers
        .route("/api/trigger/analysis", post(handlers::trigger_analysis))
        .route(
            "/api/trigger/text-analysis",
            post(handlers::trigger_text_analysis),
        )
        .route(
            "/api/trigger/video-analysis",
            post(handlers::trigger_video_analysis),
        )
        // Status and records
        .route("/api/status", get(handlers::api_status))
        .route("/api/videos", get(handlers::api_videos))
        // Video playback
        .route("/media/*path", get(handlers::media_file))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
