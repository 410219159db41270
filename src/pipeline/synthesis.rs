//! Reply speech synthesis

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;

use super::{StageOutcome, bounded};
use crate::Config;
use crate::registry::ModelRegistry;

/// Synthesized reply audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioReply {
    /// Unique clip identifier, also the file name when clips are kept
    pub clip_id: String,
    /// Encoded audio, empty when synthesis failed
    pub payload: Vec<u8>,
    /// Base64 of `payload`
    pub base64: String,
}

impl AudioReply {
    fn empty(clip_id: String) -> Self {
        Self {
            clip_id,
            payload: Vec::new(),
            base64: String::new(),
        }
    }

    /// Whether synthesis produced no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Turns reply text into speech
pub struct SpeechSynthesisStage {
    registry: Arc<ModelRegistry>,
    reply_dir: Option<PathBuf>,
    timeout: Duration,
    sequence: AtomicU64,
}

impl SpeechSynthesisStage {
    /// Create a stage with explicit settings
    #[must_use]
    pub const fn new(registry: Arc<ModelRegistry>, reply_dir: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            registry,
            reply_dir,
            timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Create a stage from the loaded configuration
    #[must_use]
    pub fn from_config(registry: Arc<ModelRegistry>, config: &Config) -> Self {
        Self::new(registry, config.server.reply_dir.clone(), config.stage_timeout)
    }

    /// Synthesize `text`
    ///
    /// Never fails: a missing engine, engine error or timeout yields an empty
    /// payload.
    pub async fn synthesize(&self, text: &str) -> StageOutcome<AudioReply> {
        let engine = match self.registry.text_to_speech().await {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis unavailable");
                return StageOutcome::degraded(AudioReply::empty(self.next_clip_id("mp3")), e);
            }
        };

        let clip_id = self.next_clip_id(engine.extension());
        let payload = match bounded(self.timeout, "speech synthesis", engine.synthesize(text)).await {
            Ok(payload) if !payload.is_empty() => payload,
            Ok(_) => {
                tracing::warn!(engine = engine.name(), "speech engine returned no audio");
                return StageOutcome::degraded(AudioReply::empty(clip_id), "empty audio");
            }
            Err(e) => {
                tracing::warn!(engine = engine.name(), error = %e, "speech synthesis failed");
                return StageOutcome::degraded(AudioReply::empty(clip_id), e);
            }
        };

        if let Some(dir) = &self.reply_dir {
            let path = dir.join(&clip_id);
            if let Err(e) = tokio::fs::write(&path, &payload).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to keep reply clip");
            } else {
                tracing::debug!(path = %path.display(), "reply clip written");
            }
        }

        tracing::info!(clip = %clip_id, bytes = payload.len(), "reply synthesized");
        let base64 = base64::engine::general_purpose::STANDARD.encode(&payload);
        StageOutcome::Completed(AudioReply {
            clip_id,
            payload,
            base64,
        })
    }

    /// `reply_<unix-millis>_<seq>.<ext>`, unique within the process
    fn next_clip_id(&self, extension: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        format!("reply_{millis}_{seq}.{extension}")
    }
}
