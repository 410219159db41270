//! Inference engine contracts
//!
//! Every capability the pipeline consumes (speech recognition, noise
//! reduction, object detection, captioning, translation, speech synthesis) is
//! a trait here. Handles are constructed by an [`EngineFactory`] and cached by
//! the [`ModelRegistry`](crate::registry::ModelRegistry).

mod factory;
pub mod providers;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;

pub use factory::{ConfiguredEngines, EngineFactory};

/// The kinds of engine the registry manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    SpeechToText,
    NoiseReducer,
    ObjectDetector,
    Captioner,
    Translator,
    TextToSpeech,
}

impl EngineKind {
    /// Every engine kind, in pipeline order
    pub const ALL: [Self; 6] = [
        Self::NoiseReducer,
        Self::SpeechToText,
        Self::ObjectDetector,
        Self::Captioner,
        Self::Translator,
        Self::TextToSpeech,
    ];

    /// Stable identifier used in logs and API responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpeechToText => "speech-to-text",
            Self::NoiseReducer => "noise-reducer",
            Self::ObjectDetector => "object-detector",
            Self::Captioner => "captioner",
            Self::Translator => "translator",
            Self::TextToSpeech => "text-to-speech",
        }
    }

    /// Whether a construction failure of this kind must abort the request
    ///
    /// Optional kinds only ever improve a reply; without them the pipeline
    /// falls back to the unprocessed input or an empty value.
    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Self::SpeechToText | Self::ObjectDetector | Self::Captioner)
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speech recognition engine variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechEngine {
    /// `OpenAI`-compatible Whisper transcription endpoint
    Whisper,
    /// `PhoWhisper` served by the Hugging Face inference API
    PhoWhisper,
}

impl FromStr for SpeechEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whisper" => Ok(Self::Whisper),
            "pho-whisper" | "phowhisper" => Ok(Self::PhoWhisper),
            other => Err(format!("unknown speech engine: {other}")),
        }
    }
}

/// Speech synthesis engine variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TtsEngine {
    /// Google Translate speech endpoint
    #[serde(rename = "google")]
    Google,
    /// `OpenAI` speech endpoint
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for TtsEngine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown TTS engine: {other}")),
        }
    }
}

/// An uploaded media payload
#[derive(Debug, Clone, Default)]
pub struct MediaBlob {
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// MIME type reported by the client, if any
    pub mime_type: Option<String>,
    /// File name reported by the client, if any
    pub file_name: Option<String>,
}

impl MediaBlob {
    /// Create a blob from raw bytes with no metadata
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: None,
            file_name: None,
        }
    }

    /// Attach a MIME type
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Attach a file name
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// MIME type, falling back to `fallback` when the client sent none
    #[must_use]
    pub fn mime_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.mime_type.as_deref().unwrap_or(fallback)
    }

    /// Whether the payload has no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decoding parameters passed to the speech engine
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingOptions {
    /// Recognition language (ISO 639-1)
    pub language: String,
    /// Sampling temperature; 0 selects the most likely token every step
    pub temperature: f32,
    /// Beam width
    pub beam_size: u32,
    /// Number of candidates sampled
    pub best_of: u32,
    /// Whether earlier output primes later windows
    pub condition_on_previous_text: bool,
}

impl DecodingOptions {
    /// Greedy single-hypothesis decoding: identical input gives identical text
    #[must_use]
    pub fn deterministic(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            temperature: 0.0,
            beam_size: 1,
            best_of: 1,
            condition_on_previous_text: false,
        }
    }
}

/// One detected bounding box
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundingBox {
    /// Class label as emitted by the detector (English)
    pub label: String,
    /// Detection confidence in `0..=1`
    pub confidence: f32,
    /// Box width in pixels
    pub width: f32,
    /// Box height in pixels
    pub height: f32,
}

impl BoundingBox {
    /// Box area in square pixels
    #[must_use]
    pub fn area(&self) -> f64 {
        f64::from(self.width.max(0.0)) * f64::from(self.height.max(0.0))
    }
}

/// Detector output for one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    /// Image width in pixels
    pub image_width: u32,
    /// Image height in pixels
    pub image_height: u32,
    /// Boxes in the order the detector emitted them
    pub boxes: Vec<BoundingBox>,
}

impl Detections {
    /// Total image area in square pixels
    #[must_use]
    pub fn image_area(&self) -> f64 {
        f64::from(self.image_width) * f64::from(self.image_height)
    }
}

/// Transcribes speech to text
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio payload
    ///
    /// # Errors
    ///
    /// Returns error if the engine call fails
    async fn transcribe(&self, audio: &MediaBlob, options: &DecodingOptions) -> Result<String>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Best-effort audio cleanup before recognition
#[async_trait]
pub trait NoiseReducer: Send + Sync {
    /// Return a cleaned copy of the audio
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be processed
    async fn reduce(&self, audio: &MediaBlob) -> Result<MediaBlob>;

    /// Whether this reducer can decode the audio at all
    ///
    /// Unsupported audio is passed to recognition untouched.
    fn supports(&self, _audio: &MediaBlob) -> bool {
        true
    }

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Detects objects in an image
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Detect objects whose confidence is at least `confidence`
    ///
    /// # Errors
    ///
    /// Returns error if the engine call fails
    async fn detect(&self, image: &MediaBlob, confidence: f32) -> Result<Detections>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Produces a scene-level description of an image
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Caption an image (English)
    ///
    /// # Errors
    ///
    /// Returns error if the engine call fails
    async fn caption(&self, image: &MediaBlob) -> Result<String>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Machine translation
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language` (source auto-detected)
    ///
    /// # Errors
    ///
    /// Returns error if the engine call fails
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes speech from text
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into encoded audio
    ///
    /// # Errors
    ///
    /// Returns error if the engine call fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// File extension of the produced audio
    fn extension(&self) -> &'static str {
        "mp3"
    }

    /// Engine name for logging
    fn name(&self) -> &'static str;
}
