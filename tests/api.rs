//! API endpoint integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use linda_server::config::ServerConfig;
use linda_server::pipeline::VisionMode;
use linda_server::{ApiServer, ApiState, EngineKind};
use tower::ServiceExt;

mod common;
use common::{Harness, Script, test_config};

const BOUNDARY: &str = "linda-test-boundary";

/// One multipart part: field name, file name, content type, bytes
type Part<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, content_type, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn chat_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat-multimodal")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn server_config(max_upload_bytes: usize) -> ServerConfig {
    let mut server = test_config(VisionMode::DetectionOnly).server;
    server.max_upload_bytes = max_upload_bytes;
    server
}

/// Build a test API router
fn build_test_router(harness: &Harness, max_upload_bytes: usize) -> axum::Router {
    let state = ApiState::new(harness.orchestrator.clone(), harness.registry.clone());
    ApiServer::new(state, &server_config(max_upload_bytes)).router()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

const AUDIO: Part<'static> = ("audio_file", "command.wav", "audio/wav", b"RIFF....WAVE");
const IMAGE: Part<'static> = ("image_file", "frame.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF]);

#[tokio::test]
async fn test_root_banner() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "Linda Vision & Voice Server");
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ready_reports_loaded_engines() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.clone().oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["status"], "warming");
    assert_eq!(json["vision_mode"], "detection-only");
    assert_eq!(json["engines"], serde_json::json!([]));

    harness.registry.preload(&[EngineKind::SpeechToText]).await;

    let response = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["engines"], serde_json::json!(["speech-to-text"]));
}

#[tokio::test]
async fn test_chat_with_image() {
    let script = Script::new("bạn thấy gì trước mặt").with_boxes(
        640,
        480,
        &[("person", 100.0, 300.0), ("person", 80.0, 200.0), ("car", 200.0, 100.0)],
    );
    let harness = Harness::detection_only(script);
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(chat_request(&[AUDIO, IMAGE])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["user_text"], "bạn thấy gì trước mặt");
    assert_eq!(json["vision_info"], "Tôi thấy có: 2 người, 1 xe hơi.");
    assert!(json["reply"].as_str().unwrap().contains("2 người, 1 xe hơi"));
    assert!(!json["audio_response"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unusable_transcript_returns_reply_only() {
    let harness = Harness::detection_only(Script::new(""));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(chat_request(&[AUDIO])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(
        json,
        serde_json::json!({ "reply": "Xin lỗi, tôi không nghe rõ bạn nói gì." })
    );
}

#[tokio::test]
async fn test_missing_audio_is_bad_request() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(chat_request(&[IMAGE])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "bad_request");
    assert_eq!(harness.factory.builds(EngineKind::SpeechToText), 0);
}

#[tokio::test]
async fn test_missing_speech_engine_is_unavailable() {
    let harness =
        Harness::detection_only(Script::new("xin chào").unavailable(EngineKind::SpeechToText));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(chat_request(&[AUDIO])).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "engine_unavailable");
    assert!(json["error"]["message"].as_str().unwrap().contains("speech-to-text"));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 64);

    let big = vec![0u8; 1024];
    let response = app
        .oneshot(chat_request(&[("audio_file", "big.wav", "audio/wav", big.as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(harness.factory.builds(EngineKind::SpeechToText), 0);
}

#[tokio::test]
async fn test_not_found() {
    let harness = Harness::detection_only(Script::new("xin chào"));
    let app = build_test_router(&harness, 1024 * 1024);

    let response = app.oneshot(get("/nonexistent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
