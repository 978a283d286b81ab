use super::state::AppState;
use crate::session::{SessionError, SessionSnapshot};
use crate::synthesis::{SynthesisError, SynthesisRequest};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    /// Text to speak in the recorded voice
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn session_error_response(e: SessionError) -> Response {
    let status = match e {
        SessionError::SessionAlreadyActive => StatusCode::CONFLICT,
        SessionError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::ManagerClosed => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn synthesis_error_response(e: SynthesisError) -> Response {
    let status = match e {
        SynthesisError::EmptyText => StatusCode::BAD_REQUEST,
        SynthesisError::MissingRecording => StatusCode::CONFLICT,
        SynthesisError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SynthesisError::Rejected { .. } | SynthesisError::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e.to_string())
}

fn snapshot_response(result: Result<SessionSnapshot, SessionError>) -> Response {
    match result {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            error!("Failed to read session state: {}", e);
            session_error_response(e)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recorder/start
/// Acquire the input device and start a new session
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.recorder.start().await {
        Ok(()) => {
            info!("Recording started via HTTP");
            snapshot_response(state.recorder.snapshot().await)
        }
        Err(e) => {
            warn!("Failed to start recording: {}", e);
            session_error_response(e)
        }
    }
}

/// POST /recorder/stop
/// Stop recording; a no-op unless a session is recording
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    if let Err(e) = state.recorder.stop().await {
        return session_error_response(e);
    }
    snapshot_response(state.recorder.snapshot().await)
}

/// POST /recorder/reset
/// Discard the finished recording; a no-op unless finalized
pub async fn reset_recording(State(state): State<AppState>) -> Response {
    if let Err(e) = state.recorder.reset().await {
        return session_error_response(e);
    }
    snapshot_response(state.recorder.snapshot().await)
}

/// GET /recorder/status
pub async fn get_status(State(state): State<AppState>) -> Response {
    snapshot_response(state.recorder.snapshot().await)
}

/// GET /recorder/frame
/// Newest spectrum frame (empty before the first recording)
pub async fn get_frame(State(state): State<AppState>) -> Response {
    let frame = state.frames.borrow().clone();
    (StatusCode::OK, Json(frame)).into_response()
}

/// GET /recorder/artifact
/// The held recording wrapped as WAV
pub async fn get_artifact(State(state): State<AppState>) -> Response {
    let snapshot = match state.recorder.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return session_error_response(e),
    };

    let Some(artifact) = snapshot.held_artifact else {
        return error_response(StatusCode::NOT_FOUND, "No recording available");
    };

    match artifact.to_wav() {
        Ok(wav) => {
            let disposition = format!("attachment; filename=\"{}\"", artifact.file_name());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "audio/wav".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                wav,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode recording: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode recording: {}", e),
            )
        }
    }
}

/// POST /synthesize
/// Send the held recording and the given text to the voice service
pub async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Response {
    let snapshot = match state.recorder.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return session_error_response(e),
    };

    let request =
        match SynthesisRequest::from_optional(snapshot.held_artifact, &req.text, state.max_text_length) {
            Ok(request) => request,
            Err(e) => return synthesis_error_response(e),
        };

    match state.synthesis.generate(&request).await {
        Ok(audio) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, audio.content_type)],
            audio.bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Voice generation failed: {}", e);
            synthesis_error_response(e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
