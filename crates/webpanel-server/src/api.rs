//! REST handlers for system stats, host inventory, and the camera recorder.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::recording::RecordingError;
use crate::server::AppState;
use crate::websocket::envelope::{CAMERA_STATUS, Envelope};

#[derive(Serialize)]
struct DataResponse<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
struct ActionResponse<T> {
    success: bool,
    message: &'static str,
    #[serde(flatten)]
    result: T,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn data<T: Serialize>(data: T) -> Response {
    Json(DataResponse {
        success: true,
        data,
    })
    .into_response()
}

fn action<T: Serialize>(message: &'static str, result: T) -> Response {
    Json(ActionResponse {
        success: true,
        message,
        result,
    })
    .into_response()
}

fn error(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn recording_error(e: &RecordingError) -> Response {
    let status = match e {
        RecordingError::AlreadyRecording | RecordingError::NotRecording => StatusCode::BAD_REQUEST,
        RecordingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e)
}

/// GET /api/system
pub async fn system_info(State(state): State<AppState>) -> Response {
    match state.stats.snapshot().await {
        Ok(info) => data(info),
        Err(e) => {
            warn!(error = %e, "stats snapshot failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/processes
pub async fn processes(State(state): State<AppState>) -> Response {
    match state.inventory.processes().await {
        Ok(list) => data(list),
        Err(e) => {
            warn!(error = %e, "process listing failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// GET /api/services
pub async fn services(State(state): State<AppState>) -> Response {
    data(state.inventory.services().await)
}

/// GET /api/camera/status
pub async fn camera_status(State(state): State<AppState>) -> Response {
    match state.recording.status().await {
        Ok(status) => data(status),
        Err(e) => recording_error(&e),
    }
}

/// POST /api/camera/start-recording
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.recording.start().await {
        Ok(started) => {
            broadcast_camera_status(&state).await;
            action("Recording started successfully", started)
        }
        Err(e) => recording_error(&e),
    }
}

/// POST /api/camera/stop-recording
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    match state.recording.stop().await {
        Ok(stopped) => {
            broadcast_camera_status(&state).await;
            action("Recording stopped successfully", stopped)
        }
        Err(e) => recording_error(&e),
    }
}

/// Push the recorder's new state to every live session.
async fn broadcast_camera_status(state: &AppState) {
    let status = match state.recording.status().await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "camera status unavailable, skipping broadcast");
            return;
        }
    };
    match Envelope::with_payload(CAMERA_STATUS, &status) {
        Ok(env) => state.hub.broadcast(&env).await,
        Err(e) => warn!(error = %e, "failed to encode camera status"),
    }
}
