//! Engine construction
//!
//! The registry never builds engines itself; it asks an [`EngineFactory`].
//! Production code uses [`ConfiguredEngines`], tests substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use super::providers::{
    DetectionService, GoogleTranslator, GoogleTts, NoiseGate, OpenAiCaptioner, OpenAiTts,
    PhoWhisper, WhisperServer, google, openai, pho_whisper, whisper,
};
use super::{
    Captioner, NoiseReducer, ObjectDetector, SpeechEngine, SpeechToText, TextToSpeech, TtsEngine,
    Translator,
};
use crate::{Config, Error, Result};

/// Builds engine instances on first use
///
/// Each method may be expensive (model load, connection setup). The
/// registry guarantees each is called at most once per kind on success.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Build the speech recognition engine
    async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>>;

    /// Build the noise reducer
    async fn noise_reducer(&self) -> Result<Arc<dyn NoiseReducer>>;

    /// Build the object detector
    async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>>;

    /// Build the captioner
    async fn captioner(&self) -> Result<Arc<dyn Captioner>>;

    /// Build the translator
    async fn translator(&self) -> Result<Arc<dyn Translator>>;

    /// Build the speech synthesizer
    async fn text_to_speech(&self) -> Result<Arc<dyn TextToSpeech>>;
}

/// Factory that builds the engines selected in [`Config`]
pub struct ConfiguredEngines {
    config: Config,
}

impl ConfiguredEngines {
    /// Create a factory for the given configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    fn openai_key(&self, purpose: &str) -> Result<SecretString> {
        self.config
            .api_keys
            .openai
            .clone()
            .ok_or_else(|| Error::Config(format!("OPENAI_API_KEY required for {purpose}")))
    }
}

#[async_trait]
impl EngineFactory for ConfiguredEngines {
    async fn speech_to_text(&self) -> Result<Arc<dyn SpeechToText>> {
        let speech = &self.config.speech;
        let engine: Arc<dyn SpeechToText> = match speech.engine {
            SpeechEngine::Whisper => {
                let url = speech.url.clone().unwrap_or_else(|| whisper::DEFAULT_URL.to_string());
                // Self-hosted servers need no key; the hosted API does
                if url == whisper::DEFAULT_URL && self.config.api_keys.openai.is_none() {
                    return Err(Error::Config(
                        "OPENAI_API_KEY required for hosted Whisper".to_string(),
                    ));
                }
                Arc::new(WhisperServer::new(
                    url,
                    speech.model.clone().unwrap_or_else(|| whisper::DEFAULT_MODEL.to_string()),
                    self.config.api_keys.openai.clone(),
                ))
            }
            SpeechEngine::PhoWhisper => Arc::new(PhoWhisper::new(
                speech.url.clone().unwrap_or_else(|| pho_whisper::DEFAULT_URL.to_string()),
                self.config.api_keys.huggingface.clone(),
            )),
        };
        Ok(engine)
    }

    async fn noise_reducer(&self) -> Result<Arc<dyn NoiseReducer>> {
        Ok(Arc::new(NoiseGate::new()))
    }

    async fn object_detector(&self) -> Result<Arc<dyn ObjectDetector>> {
        let url = &self.config.vision.detector_url;
        if url.is_empty() {
            return Err(Error::Config("detector URL is empty".to_string()));
        }
        Ok(Arc::new(DetectionService::new(url.clone())))
    }

    async fn captioner(&self) -> Result<Arc<dyn Captioner>> {
        let vision = &self.config.vision;
        Ok(Arc::new(OpenAiCaptioner::new(
            vision.caption_url.clone().unwrap_or_else(|| openai::CHAT_URL.to_string()),
            self.openai_key("captioning")?,
            vision
                .caption_model
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_CAPTION_MODEL.to_string()),
        )))
    }

    async fn translator(&self) -> Result<Arc<dyn Translator>> {
        Ok(Arc::new(GoogleTranslator::new(
            self.config
                .translation
                .url
                .clone()
                .unwrap_or_else(|| google::TRANSLATE_URL.to_string()),
        )))
    }

    async fn text_to_speech(&self) -> Result<Arc<dyn TextToSpeech>> {
        let tts = &self.config.tts;
        let engine: Arc<dyn TextToSpeech> = match tts.engine {
            TtsEngine::Google => Arc::new(GoogleTts::new(
                tts.url.clone().unwrap_or_else(|| google::TTS_URL.to_string()),
                self.config.translation.target_language.clone(),
            )),
            TtsEngine::OpenAi => Arc::new(OpenAiTts::new(
                tts.url.clone().unwrap_or_else(|| openai::SPEECH_URL.to_string()),
                self.openai_key("OpenAI TTS")?,
                tts.model.clone().unwrap_or_else(|| openai::DEFAULT_TTS_MODEL.to_string()),
                tts.voice.clone(),
                tts.speed,
            )),
        };
        Ok(engine)
    }
}
