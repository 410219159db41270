//! Registry concurrency tests

use std::sync::Arc;
use std::time::Duration;

use linda_server::{EngineKind, ModelRegistry};

mod common;
use common::{FakeFactory, Script};

fn slow_factory(script: Script) -> Arc<FakeFactory> {
    let mut script = script;
    script.build_delay = Duration::from_millis(50);
    Arc::new(FakeFactory::new(script))
}

#[tokio::test]
async fn concurrent_gets_construct_once() {
    let factory = slow_factory(Script::new("xin chào"));
    let registry = Arc::new(ModelRegistry::new(factory.clone()));

    let (a, b) = tokio::join!(registry.speech_to_text(), registry.speech_to_text());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(factory.builds(EngineKind::SpeechToText), 1);
}

#[tokio::test]
async fn concurrent_gets_across_tasks_construct_once() {
    let factory = slow_factory(Script::new("xin chào"));
    let registry = Arc::new(ModelRegistry::new(factory.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.object_detector().await.map(|_| ()) })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(factory.builds(EngineKind::ObjectDetector), 1);
    assert_eq!(registry.loaded(), vec![EngineKind::ObjectDetector]);
}

#[tokio::test]
async fn failed_kind_is_isolated_and_retried() {
    let factory = slow_factory(Script::new("xin chào").unavailable(EngineKind::Captioner));
    let registry = ModelRegistry::new(factory.clone());

    let failures = registry.preload(&EngineKind::ALL).await;

    assert_eq!(failures.len(), 1);
    assert!(!registry.is_loaded(EngineKind::Captioner));
    assert_eq!(registry.loaded().len(), EngineKind::ALL.len() - 1);

    assert!(registry.captioner().await.is_err());
    assert_eq!(factory.builds(EngineKind::Captioner), 2);
    assert_eq!(factory.builds(EngineKind::SpeechToText), 1);
}
