//! End-to-end orchestration tests against scripted engines

use std::time::Duration;

use base64::Engine;
use linda_server::pipeline::VisionMode;
use linda_server::{EngineKind, Error, IncomingRequest};

mod common;
use common::{FAKE_AUDIO, Harness, Script, audio, image, test_config};

fn with_image() -> IncomingRequest {
    IncomingRequest {
        audio: audio(),
        image: Some(image()),
    }
}

fn without_image() -> IncomingRequest {
    IncomingRequest {
        audio: audio(),
        image: None,
    }
}

#[tokio::test]
async fn vision_query_counts_objects() {
    let script = Script::new("bạn thấy gì trước mặt").with_boxes(
        640,
        480,
        &[("person", 200.0, 400.0), ("car", 100.0, 50.0), ("person", 50.0, 120.0)],
    );
    let harness = Harness::detection_only(script);

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(response.user_text.as_deref(), Some("bạn thấy gì trước mặt"));
    assert_eq!(response.vision_info.as_deref(), Some("Tôi thấy có: 2 người, 1 xe hơi."));
    assert!(response.reply.contains("2 người, 1 xe hơi"));
    assert!(response.reply.starts_with("Bạn vừa hỏi: 'bạn thấy gì trước mặt'."));
    assert_eq!(
        response.audio_response,
        Some(base64::engine::general_purpose::STANDARD.encode(FAKE_AUDIO))
    );
}

#[tokio::test]
async fn detection_narrates_at_most_three_labels() {
    let script = Script::new("bạn thấy gì trước mặt").with_boxes(
        640,
        480,
        &[
            ("person", 200.0, 400.0),
            ("car", 100.0, 50.0),
            ("dog", 60.0, 40.0),
            ("cat", 30.0, 30.0),
            ("chair", 50.0, 80.0),
        ],
    );
    let harness = Harness::detection_only(script);

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(response.vision_info.as_deref(), Some("Tôi thấy có: 1 người, 1 xe hơi, 1 chó."));
    assert!(!response.reply.contains("mèo"));
}

#[tokio::test]
async fn vision_query_without_image_asks_for_camera() {
    let harness = Harness::detection_only(Script::new("NHÌN giúp tôi"));

    let response = harness.orchestrator.handle(&without_image()).await.unwrap();

    assert_eq!(
        response.reply,
        "Bạn muốn tôi nhìn, nhưng tôi chưa nhận được hình ảnh nào cả."
    );
    assert_eq!(response.vision_info.as_deref(), Some(""));
    assert_eq!(harness.factory.builds(EngineKind::ObjectDetector), 0);
}

#[tokio::test]
async fn greeting_echoes_transcript() {
    let harness = Harness::detection_only(Script::new("Xin chào Linda"));

    // An image without a vision keyword is ignored
    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(
        response.reply,
        "Chào bạn, tôi đã nghe thấy bạn nói: 'Xin chào Linda'. Tôi có thể giúp gì?"
    );
    assert_eq!(response.vision_info.as_deref(), Some(""));
    assert!(!response.audio_response.unwrap().is_empty());
    assert_eq!(harness.factory.builds(EngineKind::ObjectDetector), 0);
}

#[tokio::test]
async fn hallucinated_transcript_short_circuits() {
    let harness = Harness::detection_only(Script::new("Subtitles by the Amara.org community"));

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(response.reply, "Xin lỗi, tôi không nghe rõ bạn nói gì.");
    assert!(response.user_text.is_none());
    assert!(response.vision_info.is_none());
    assert!(response.audio_response.is_none());
    assert_eq!(harness.factory.builds(EngineKind::TextToSpeech), 0);
    assert_eq!(harness.factory.builds(EngineKind::ObjectDetector), 0);
}

#[tokio::test]
async fn zero_detections_narrate_nothing_visible() {
    let harness = Harness::detection_only(Script::new("trước mặt có gì"));

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(
        response.vision_info.as_deref().unwrap_or_default(),
        "Tôi không thấy vật thể nào rõ ràng trước mặt."
    );
}

#[tokio::test]
async fn captioning_describes_scene_and_distances() {
    let script = Script::new("bạn thấy gì").with_boxes(
        100,
        100,
        &[
            ("person", 80.0, 80.0),
            ("car", 10.0, 10.0),
            ("dog", 30.0, 30.0),
            ("cat", 50.0, 50.0),
        ],
    );
    let harness = Harness::captioning(script);

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(
        response.vision_info.as_deref().unwrap_or_default(),
        "Khung cảnh chung là một người đàn ông đi trên phố. Cụ thể, tôi thấy: \
         một người đang rất gần (ngay trước mặt), một xe hơi đang ở phía xa, \
         một chó đang cách khoảng 3-5 mét."
    );
}

#[tokio::test]
async fn missing_translator_substitutes_generic_caption() {
    let script = Script::new("bạn thấy gì").unavailable(EngineKind::Translator);
    let harness = Harness::captioning(script);

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(
        response.vision_info.as_deref().unwrap_or_default(),
        "Khung cảnh chung là một khung cảnh mà tôi chưa mô tả được."
    );
}

#[tokio::test]
async fn detector_failure_degrades() {
    let script = Script::new("bạn thấy gì").broken(EngineKind::ObjectDetector);
    let harness = Harness::detection_only(script);

    let response = harness.orchestrator.handle(&with_image()).await.unwrap();

    assert_eq!(
        response.vision_info.as_deref().unwrap_or_default(),
        "Tôi không thấy vật thể nào rõ ràng trước mặt."
    );
}

#[tokio::test]
async fn missing_detector_is_fatal() {
    let script = Script::new("bạn thấy gì").unavailable(EngineKind::ObjectDetector);
    let harness = Harness::detection_only(script);

    let err = harness.orchestrator.handle(&with_image()).await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::EngineConstruction {
            kind: EngineKind::ObjectDetector,
            ..
        }
    ));
}

#[tokio::test]
async fn missing_speech_engine_is_fatal() {
    let harness = Harness::detection_only(Script::new("xin chào").unavailable(EngineKind::SpeechToText));

    let err = harness.orchestrator.handle(&without_image()).await.unwrap_err();

    assert!(err.is_fatal());
}

#[tokio::test]
async fn optional_engines_degrade() {
    let script = Script::new("xin chào")
        .unavailable(EngineKind::NoiseReducer)
        .unavailable(EngineKind::TextToSpeech);
    let harness = Harness::detection_only(script);

    let response = harness.orchestrator.handle(&without_image()).await.unwrap();

    assert_eq!(response.user_text.as_deref(), Some("xin chào"));
    assert!(!response.reply.is_empty());
    assert_eq!(response.audio_response.as_deref(), Some(""));
}

#[tokio::test]
async fn slow_speech_engine_times_out() {
    let mut script = Script::new("xin chào");
    script.stt_delay = Duration::from_secs(5);
    let mut config = test_config(VisionMode::DetectionOnly);
    config.stage_timeout = Duration::from_millis(50);
    let harness = Harness::new(script, &config);

    let response = harness.orchestrator.handle(&without_image()).await.unwrap();

    assert_eq!(response.reply, "Xin lỗi, tôi không nghe rõ bạn nói gì.");
}

#[tokio::test]
async fn engines_are_built_once_across_requests() {
    let script = Script::new("bạn thấy gì").with_boxes(10, 10, &[("cat", 5.0, 5.0)]);
    let harness = Harness::detection_only(script);

    for _ in 0..3 {
        harness.orchestrator.handle(&with_image()).await.unwrap();
    }

    assert_eq!(harness.factory.builds(EngineKind::SpeechToText), 1);
    assert_eq!(harness.factory.builds(EngineKind::ObjectDetector), 1);
    assert_eq!(harness.factory.builds(EngineKind::TextToSpeech), 1);
}
