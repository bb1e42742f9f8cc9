use super::state::AppState;
use crate::error::RecorderError;
use crate::session::StartRequest;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(err: &RecorderError) -> Response {
    let status = if err.is_conflict() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// An empty body means all defaults; anything else must parse
fn parse_start_request(body: &[u8]) -> Result<StartRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartRequest::default());
    }
    serde_json::from_slice(body)
}

/// POST /api/start
/// Start a recording; the body is optional
pub async fn start_recording(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request = match parse_start_request(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid request body: {}", e),
                }),
            )
                .into_response();
        }
    };

    match state.recorder.start(request) {
        Ok(response) => {
            info!("Recording started: {}", response.session_id);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            if !e.is_conflict() {
                error!("Failed to start recording: {}", e);
            }
            error_response(&e)
        }
    }
}

/// POST /api/stop
/// Stop recording and export; blocks until the artifact is written
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = state.recorder.clone();
    match tokio::task::spawn_blocking(move || recorder.stop()).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(report)).into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Stop task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to stop recording: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.recorder.status()))
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.recorder.settings()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
