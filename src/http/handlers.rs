use super::state::AppState;
use crate::event::EventStats;
use crate::storage::RecordingEntry;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub stats: EventStats,
    pub sample_rate: u32,
    pub duration_secs: u32,
    pub threshold: u16,
    pub gain: i32,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /status
/// Current pipeline state and counters
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        stats: state.shared.stats(),
        sample_rate: state.capture.sample_rate,
        duration_secs: state.capture.duration_secs,
        threshold: state.threshold,
        gain: state.capture.gain,
    })
}

/// GET /recordings
/// List stored recordings, newest first
pub async fn list_recordings(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    let listing = tokio::task::spawn_blocking(move || store.list()).await;

    match listing {
        Ok(Ok(entries)) => (StatusCode::OK, Json::<Vec<RecordingEntry>>(entries)).into_response(),
        Ok(Err(e)) => {
            error!("Failed to list recordings: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list recordings: {}", e),
            )
        }
        Err(e) => {
            error!("Listing task panicked: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Listing failed".to_string())
        }
    }
}

/// GET /recordings/:name
/// Download one recording as WAV
pub async fn download_recording(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let path = match state.store.path_for(&name) {
        Ok(path) => path,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "audio/wav".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, format!("Recording {} not found", name))
        }
        Err(e) => {
            error!("Failed to read {}: {}", name, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read recording: {}", e),
            )
        }
    }
}

/// DELETE /recordings/:name
/// Delete one recording
pub async fn delete_recording(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if let Err(e) = state.store.path_for(&name) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let store = state.store.clone();
    let target = name.clone();
    let removal = tokio::task::spawn_blocking(move || store.remove(&target)).await;

    match removal {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e)) if is_not_found(&e) => {
            error_response(StatusCode::NOT_FOUND, format!("Recording {} not found", name))
        }
        Ok(Err(e)) => {
            error!("Failed to delete {}: {:#}", name, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to delete recording: {}", e),
            )
        }
        Err(e) => {
            error!("Delete task panicked: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Delete failed".to_string())
        }
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}
