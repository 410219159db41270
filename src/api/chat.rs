//! Multimodal chat endpoint

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::engines::MediaBlob;
use crate::pipeline::{ChatResponse, IncomingRequest};

/// Multipart field carrying the spoken command
pub const AUDIO_FIELD: &str = "audio_file";

/// Multipart field carrying the optional camera frame
pub const IMAGE_FIELD: &str = "image_file";

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat-multimodal", post(chat_multimodal))
        .with_state(state)
}

/// Handle one voice turn with optional image context
async fn chat_multimodal(
    State(state): State<Arc<ApiState>>,
    multipart: Multipart,
) -> Result<Json<ChatResponse>, ChatError> {
    let request = read_request(multipart).await?;

    tracing::info!(
        audio_bytes = request.audio.bytes.len(),
        audio_file = ?request.audio.file_name,
        image_bytes = request.image.as_ref().map(|i| i.bytes.len()),
        "chat turn received"
    );

    let response = state.orchestrator.handle(&request).await?;
    Ok(Json(response))
}

/// Collect the audio and image parts; unknown fields are ignored
async fn read_request(mut multipart: Multipart) -> Result<IncomingRequest, ChatError> {
    let mut audio = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let mut blob = MediaBlob::new(Vec::new());
        if let Some(file_name) = field.file_name() {
            blob = blob.with_file_name(file_name);
        }
        if let Some(content_type) = field.content_type() {
            blob = blob.with_mime_type(content_type);
        }
        blob.bytes = field.bytes().await?.to_vec();

        match name.as_str() {
            AUDIO_FIELD => audio = Some(blob),
            IMAGE_FIELD => image = Some(blob),
            other => tracing::debug!(field = other, "ignoring multipart field"),
        }
    }

    let audio = audio
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ChatError::BadRequest(format!("missing {AUDIO_FIELD}")))?;
    // Browsers send an empty part for an unset file input
    let image = image.filter(|i| !i.is_empty());

    Ok(IncomingRequest { audio, image })
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    /// The request body is not what the endpoint expects
    BadRequest(String),
    /// The multipart stream could not be read
    Multipart(MultipartError),
    /// A required engine could not be constructed
    EngineUnavailable(String),
    /// Anything else that escaped the pipeline
    Internal(String),
}

impl From<MultipartError> for ChatError {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e)
    }
}

impl From<crate::Error> for ChatError {
    fn from(e: crate::Error) -> Self {
        if e.is_fatal() {
            Self::EngineUnavailable(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Multipart(e) => {
                let status = e.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "bad_request"
                };
                (status, code, e.body_text())
            }
            Self::EngineUnavailable(msg) => {
                tracing::error!(error = %msg, "request aborted");
                (StatusCode::SERVICE_UNAVAILABLE, "engine_unavailable", msg)
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
