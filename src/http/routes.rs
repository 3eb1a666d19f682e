use super::handlers;
use super::state::AppState;
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Detector status
        .route("/status", get(handlers::get_status))
        // File browser
        .route("/recordings", get(handlers::list_recordings))
        .route(
            "/recordings/:name",
            get(handlers::download_recording).delete(handlers::delete_recording),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the HTTP listener; failure is a fatal startup error
pub async fn bind_listener(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))
}
