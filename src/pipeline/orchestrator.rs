//! Per-request sequencing of the pipeline stages

use std::sync::Arc;

use serde::Serialize;

use super::{
    Intent, IntentClassifier, ResponseComposer, SpeechSynthesisStage, StageOutcome,
    TranscriptionStage, VisionMode, VisionStage,
};
use crate::engines::MediaBlob;
use crate::registry::ModelRegistry;
use crate::{Config, Result};

/// One user turn as uploaded
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Spoken command
    pub audio: MediaBlob,
    /// Camera frame, if the client sent one
    pub image: Option<MediaBlob>,
}

/// Response body for one turn
///
/// An utterance that was not understood carries only `reply`. Otherwise all
/// four fields are present and those that do not apply are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    /// Recognized user text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_text: Option<String>,
    /// Scene narration, empty unless vision ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision_info: Option<String>,
    /// Reply text
    pub reply: String,
    /// Base64 reply audio, empty when synthesis failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_response: Option<String>,
}

impl ChatResponse {
    /// Reply-only response for an utterance that was not understood
    #[must_use]
    pub fn not_heard(reply: String) -> Self {
        Self {
            reply,
            ..Self::default()
        }
    }
}

/// Runs transcription, intent, vision, composition and synthesis for a turn
///
/// Holds no per-request state; one instance serves every request.
pub struct RequestOrchestrator {
    transcription: TranscriptionStage,
    classifier: IntentClassifier,
    vision: VisionStage,
    composer: ResponseComposer,
    synthesis: SpeechSynthesisStage,
}

impl RequestOrchestrator {
    /// Assemble an orchestrator from its stages
    #[must_use]
    pub const fn new(
        transcription: TranscriptionStage,
        classifier: IntentClassifier,
        vision: VisionStage,
        synthesis: SpeechSynthesisStage,
    ) -> Self {
        Self {
            transcription,
            classifier,
            vision,
            composer: ResponseComposer,
            synthesis,
        }
    }

    /// Build every stage from the loaded configuration
    #[must_use]
    pub fn from_config(registry: &Arc<ModelRegistry>, config: &Config) -> Self {
        Self::new(
            TranscriptionStage::from_config(Arc::clone(registry), config),
            IntentClassifier::new(&config.vision_keywords),
            VisionStage::from_config(Arc::clone(registry), config),
            SpeechSynthesisStage::from_config(Arc::clone(registry), config),
        )
    }

    /// The configured vision mode
    #[must_use]
    pub const fn vision_mode(&self) -> VisionMode {
        self.vision.mode()
    }

    /// Handle one turn
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineConstruction`](crate::Error::EngineConstruction)
    /// if a required engine cannot be built; every other failure degrades
    pub async fn handle(&self, request: &IncomingRequest) -> Result<ChatResponse> {
        let transcript = self.transcription.transcribe(&request.audio).await?;
        log_degraded("transcription", &transcript);
        let transcript = transcript.into_value();

        if !transcript.usable {
            return Ok(ChatResponse::not_heard(self.composer.apology().text));
        }

        let intent = self.classifier.classify(&transcript.text);
        tracing::info!(?intent, image = request.image.is_some(), "intent classified");

        let vision = match (intent, &request.image) {
            (Intent::VisionQuery, Some(image)) => {
                let outcome = self.vision.analyze(image).await?;
                log_degraded("vision", &outcome);
                Some(outcome.into_value())
            }
            _ => None,
        };
        let vision_info = vision
            .as_ref()
            .map(ResponseComposer::narrate)
            .unwrap_or_default();

        let reply = self.composer.compose(
            &transcript,
            intent,
            request.image.is_some(),
            vision.as_ref(),
        );

        let audio = self.synthesis.synthesize(&reply.text).await;
        log_degraded("synthesis", &audio);

        Ok(ChatResponse {
            user_text: Some(transcript.text),
            vision_info: Some(vision_info),
            reply: reply.text,
            audio_response: Some(audio.into_value().base64),
        })
    }
}

fn log_degraded<T>(stage: &str, outcome: &StageOutcome<T>) {
    if let StageOutcome::Degraded { cause, .. } = outcome {
        tracing::warn!(stage, cause = %cause, "stage degraded");
    }
}
