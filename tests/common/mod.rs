//! Shared test utilities: scripted engines and a counting factory
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use linda_server::engines::{
    BoundingBox, Captioner, DecodingOptions, Detections, MediaBlob, NoiseReducer, ObjectDetector,
    SpeechToText, TextToSpeech, Translator,
};
use linda_server::pipeline::VisionMode;
use linda_server::{Config, EngineFactory, EngineKind, Error, ModelRegistry, RequestOrchestrator, Result};

/// Bytes every fake synthesis returns
pub const FAKE_AUDIO: &[u8] = b"ID3fake-mp3";

/// Scripted behavior for every engine kind
#[derive(Clone)]
pub struct Script {
    pub transcript: String,
    pub detections: Detections,
    pub caption: String,
    pub translation: String,
    /// Kinds whose construction fails
    pub unavailable: Vec<EngineKind>,
    /// Kinds whose calls fail after construction
    pub broken: Vec<EngineKind>,
    /// Delay before each speech recognition call returns
    pub stt_delay: Duration,
    /// Delay before each construction returns
    pub build_delay: Duration,
}

impl Script {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            detections: Detections::default(),
            caption: "a man walking on the street".to_string(),
            translation: "một người đàn ông đi trên phố".to_string(),
            unavailable: Vec::new(),
            broken: Vec::new(),
            stt_delay: Duration::ZERO,
            build_delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_boxes(mut self, width: u32, height: u32, boxes: &[(&str, f32, f32)]) -> Self {
        self.detections = detections(width, height, boxes);
        self
    }

    #[must_use]
    pub fn unavailable(mut self, kind: EngineKind) -> Self {
        self.unavailable.push(kind);
        self
    }

    #[must_use]
    pub fn broken(mut self, kind: EngineKind) -> Self {
        self.broken.push(kind);
        self
    }

    fn check(&self, kind: EngineKind) -> Result<()> {
        if self.broken.contains(&kind) {
            return Err(Error::Vision(format!("{kind} is broken")));
        }
        Ok(())
    }
}

/// Build a detector result from `(label, width, height)` triples
pub fn detections(width: u32, height: u32, boxes: &[(&str, f32, f32)]) -> Detections {
    Detections {
        image_width: width,
        image_height: height,
        boxes: boxes
            .iter()
            .map(|(label, w, h)| BoundingBox {
                label: (*label).to_string(),
                confidence: 0.9,
                width: *w,
                height: *h,
            })
            .collect(),
    }
}

struct FakeEngine {
    script: Arc<Script>,
}

#[async_trait]
impl SpeechToText for FakeEngine {
    async fn transcribe(&self, _audio: &MediaBlob, _options: &DecodingOptions) -> Result<String> {
        tokio::time::sleep(self.script.stt_delay).await;
        self.script.check(EngineKind::SpeechToText)?;
        Ok(self.script.transcript.clone())
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

#[async_trait]
impl NoiseReducer for FakeEngine {
    async fn reduce(&self, audio: &MediaBlob) -> Result<MediaBlob> {
        self.script.check(EngineKind::NoiseReducer)?;
        Ok(audio.clone())
    }

    fn name(&self) -> &'static str {
        "fake-denoise"
    }
}

#[async_trait]
impl ObjectDetector for FakeEngine {
    async fn detect(&self, _image: &MediaBlob, _confidence: f32) -> Result<Detections> {
        self.script.check(EngineKind::ObjectDetector)?;
        Ok(self.script.detections.clone())
    }

    fn name(&self) -> &'static str {
        "fake-detector"
    }
}

#[async_trait]
impl Captioner for FakeEngine {
    async fn caption(&self, _image: &MediaBlob) -> Result<String> {
        self.script.check(EngineKind::Captioner)?;
        Ok(self.script.caption.clone())
    }

    fn name(&self) -> &'static str {
        "fake-captioner"
    }
}

#[async_trait]
impl Translator for FakeEngine {
    async fn translate(&self, _text: &str, _target_language: &str) -> Result<String> {
        self.script.check(EngineKind::Translator)?;
        Ok(self.script.translation.clone())
    }

    fn name(&self) -> &'static str {
        "fake-translator"
    }
}

#[async_trait]
impl TextToSpeech for FakeEngine {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.script.check(EngineKind::TextToSpeech)?;
        Ok(FAKE_AUDIO.to_vec())
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Factory that builds scripted engines and counts constructions per kind
pub struct FakeFactory {
    script: Arc<Script>,
    builds: Mutex<HashMap<EngineKind, usize>>,
}

impl FakeFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            builds: Mutex::new(HashMap::new()),
        }
    }

    /// How many times `kind` was constructed
    pub fn builds(&self, kind: EngineKind) -> usize {
        self.builds.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    async fn build(&self, kind: EngineKind) -> Result<Arc<FakeEngine>> {
        *self.builds.lock().unwrap().entry(kind).or_default() += 1;
        tokio::time::sleep(self.script.build_delay).await;
        if self.script.unavailable.contains(&kind) {
            return Err(Error::Config(format!("{kind} not configured")));
        }
        Ok(Arc::new(FakeEngine {
            script: self.script.clone(),
        }))
    }
}

#[async_trait]
impl EngineFactory for FakeFactory {
    async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>> {
        Ok(self.build(EngineKind::SpeechToText).await?)
    }

    async fn noise_reducer(&self) -> Result<Arc<dyn NoiseReducer>> {
        Ok(self.build(EngineKind::NoiseReducer).await?)
    }

    async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>> {
        Ok(self.build(EngineKind::ObjectDetector).await?)
    }

    async fn captioner(&self) -> Result<Arc<dyn Captioner>> {
        Ok(self.build(EngineKind::Captioner).await?)
    }

    async fn translator(&self) -> Result<Arc<dyn Translator>> {
        Ok(self.build(EngineKind::Translator).await?)
    }

    async fn text_to_speech(&self) -> Result<Arc<dyn TextToSpeech>> {
        Ok(self.build(EngineKind::TextToSpeech).await?)
    }
}

/// Configuration used by pipeline tests
pub fn test_config(mode: VisionMode) -> Config {
    let mut config = Config::default();
    config.vision.mode = mode;
    config.stage_timeout = Duration::from_secs(2);
    config
}

/// Everything a pipeline test needs
pub struct Harness {
    pub factory: Arc<FakeFactory>,
    pub registry: Arc<ModelRegistry>,
    pub orchestrator: Arc<RequestOrchestrator>,
}

impl Harness {
    pub fn new(script: Script, config: &Config) -> Self {
        let factory = Arc::new(FakeFactory::new(script));
        let registry = Arc::new(ModelRegistry::new(factory.clone()));
        let orchestrator = Arc::new(RequestOrchestrator::from_config(&registry, config));
        Self {
            factory,
            registry,
            orchestrator,
        }
    }

    pub fn detection_only(script: Script) -> Self {
        Self::new(script, &test_config(VisionMode::DetectionOnly))
    }

    pub fn captioning(script: Script) -> Self {
        Self::new(script, &test_config(VisionMode::CaptionAndDetection))
    }
}

/// A small fake WAV upload
pub fn audio() -> MediaBlob {
    MediaBlob::new(b"RIFF....WAVEfmt ".to_vec())
        .with_mime_type("audio/wav")
        .with_file_name("command.wav")
}

/// A small fake JPEG upload
pub fn image() -> MediaBlob {
    MediaBlob::new(vec![0xFF, 0xD8, 0xFF, 0xE0])
        .with_mime_type("image/jpeg")
        .with_file_name("frame.jpg")
}
