//! Speech recognition stage

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use super::{StageOutcome, bounded};
use crate::engines::{DecodingOptions, MediaBlob};
use crate::registry::ModelRegistry;
use crate::{Config, Result};

/// Phrases speech engines emit on silence or noise instead of real speech
pub const DEFAULT_HALLUCINATIONS: &[&str] = &["Subtitles by", "Amara.org", "bối rối", "Copyright"];

/// Recognized user utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Trimmed recognized text, empty when unusable
    pub text: String,
    /// Whether the pipeline should act on this transcript
    pub usable: bool,
}

impl Transcript {
    /// A transcript the pipeline can act on
    #[must_use]
    pub fn usable(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usable: true,
        }
    }

    /// A transcript that ends the turn with an apology
    #[must_use]
    pub const fn unusable() -> Self {
        Self {
            text: String::new(),
            usable: false,
        }
    }
}

/// Cleans audio, runs the speech engine and filters the result
pub struct TranscriptionStage {
    registry: Arc<ModelRegistry>,
    options: DecodingOptions,
    noise_reduction: bool,
    hallucinations: Vec<String>,
    timeout: Duration,
}

impl TranscriptionStage {
    /// Create a stage with explicit settings
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        language: impl Into<String>,
        noise_reduction: bool,
        hallucinations: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            options: DecodingOptions::deterministic(language),
            noise_reduction,
            hallucinations,
            timeout,
        }
    }

    /// Create a stage from the loaded configuration
    #[must_use]
    pub fn from_config(registry: Arc<ModelRegistry>, config: &Config) -> Self {
        Self::new(
            registry,
            config.speech.language.clone(),
            config.speech.noise_reduction,
            config.speech.hallucinations.clone(),
            config.stage_timeout,
        )
    }

    /// Transcribe one utterance
    ///
    /// Engine failures, timeouts, empty output and known hallucinations all
    /// produce an unusable transcript.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`](crate::Error::EngineConstruction)
    /// if the speech engine cannot be built
    pub async fn transcribe(&self, audio: &MediaBlob) -> Result<StageOutcome<Transcript>> {
        let (audio, cleanup_failure) = self.clean(audio).await;

        let engine = self.registry.speech_to_text().await?;
        let started = std::time::Instant::now();
        let raw = match bounded(
            self.timeout,
            "speech recognition",
            engine.transcribe(&audio, &self.options),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(engine = engine.name(), error = %e, "transcription failed");
                return Ok(StageOutcome::degraded(Transcript::unusable(), e));
            }
        };

        let text = raw.trim();
        tracing::info!(
            engine = engine.name(),
            elapsed_ms = started.elapsed().as_millis(),
            chars = text.chars().count(),
            "transcribed"
        );

        let transcript = self.filter(text);
        Ok(match cleanup_failure {
            Some(cause) => StageOutcome::degraded(transcript, cause),
            None => StageOutcome::Completed(transcript),
        })
    }

    /// Reject empty text and known engine artifacts
    fn filter(&self, text: &str) -> Transcript {
        if text.is_empty() {
            tracing::debug!("empty transcript");
            return Transcript::unusable();
        }
        if let Some(phrase) = self
            .hallucinations
            .iter()
            .find(|phrase| text.contains(phrase.as_str()))
        {
            tracing::info!(phrase = %phrase, "discarding hallucinated transcript");
            return Transcript::unusable();
        }
        Transcript::usable(text)
    }

    /// Run the noise reducer, falling back to the original audio
    async fn clean<'a>(&self, audio: &'a MediaBlob) -> (Cow<'a, MediaBlob>, Option<String>) {
        if !self.noise_reduction {
            return (Cow::Borrowed(audio), None);
        }

        let reducer = match self.registry.noise_reducer().await {
            Ok(reducer) => reducer,
            Err(e) => {
                tracing::warn!(error = %e, "noise reducer unavailable, using original audio");
                return (Cow::Borrowed(audio), Some(e.to_string()));
            }
        };

        if !reducer.supports(audio) {
            tracing::debug!(
                engine = reducer.name(),
                mime = audio.mime_or("unknown"),
                "audio format not supported by noise reducer, skipping"
            );
            return (Cow::Borrowed(audio), None);
        }

        match bounded(self.timeout, "noise reduction", reducer.reduce(audio)).await {
            Ok(cleaned) => (Cow::Owned(cleaned), None),
            Err(e) => {
                tracing::warn!(engine = reducer.name(), error = %e, "noise reduction failed, using original audio");
                (Cow::Borrowed(audio), Some(e.to_string()))
            }
        }
    }
}
