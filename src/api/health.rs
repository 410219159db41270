//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::engines::EngineKind;

/// Root banner response
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub vision_mode: &'static str,
    /// Engines constructed so far
    pub engines: Vec<&'static str>,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Linda Vision & Voice Server",
    })
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - are the engines a request needs already loaded?
///
/// Engines load lazily, so a cold server reports `warming` with 503 until
/// the first request or a preload has built the speech engine.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let loaded = state.registry.loaded();
    let warm = loaded.contains(&EngineKind::SpeechToText);

    let (http_status, status) = if warm {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "warming")
    };

    (
        http_status,
        Json(ReadinessResponse {
            status,
            vision_mode: state.vision_mode.as_str(),
            engines: loaded.into_iter().map(EngineKind::as_str).collect(),
        }),
    )
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
