//! Request orchestration pipeline
//!
//! ```text
//! audio ──▶ Transcription ──▶ Intent ──▶ (Vision) ──▶ Compose ──▶ Synthesis
//!               │ unusable                                 │
//!               └──────────────▶ apology reply ◀───────────┘
//! ```
//!
//! Stages that can fall back return a [`StageOutcome`], so a degraded result
//! is visible in the type rather than swallowed.

use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

mod compose;
mod intent;
mod orchestrator;
mod synthesis;
mod transcription;
mod vision;

pub use compose::{Reply, ResponseComposer};
pub use intent::{DEFAULT_VISION_KEYWORDS, Intent, IntentClassifier};
pub use orchestrator::{ChatResponse, IncomingRequest, RequestOrchestrator};
pub use synthesis::{AudioReply, SpeechSynthesisStage};
pub use transcription::{DEFAULT_HALLUCINATIONS, Transcript, TranscriptionStage};
pub use vision::{
    DetectedObject, DistanceBucket, KnownLabel, Label, VisionMode, VisionStage, VisionSummary,
};

/// Result of a stage that degrades instead of failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome<T> {
    /// The engine produced the value
    Completed(T),
    /// The engine failed; `value` is the fallback
    Degraded { value: T, cause: String },
}

impl<T> StageOutcome<T> {
    /// Build a degraded outcome from any displayable cause
    pub fn degraded(value: T, cause: impl std::fmt::Display) -> Self {
        Self::Degraded {
            value,
            cause: cause.to_string(),
        }
    }

    /// Borrow the value regardless of how it was produced
    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Completed(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Take the value regardless of how it was produced
    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Whether the fallback was used
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Run one engine call under the stage timeout
async fn bounded<T, F>(limit: Duration, stage: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(stage))?
}
