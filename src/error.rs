//! Error types for the Linda server

use thiserror::Error;

use crate::engines::EngineKind;

/// Result type alias for Linda operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Linda server
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// An engine could not be constructed
    ///
    /// This is the only error that aborts a request: without the engine no
    /// meaningful reply can be produced.
    #[error("failed to construct {kind} engine: {reason}")]
    EngineConstruction { kind: EngineKind, reason: String },

    /// Audio decoding/encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Object detection or captioning error
    #[error("vision error: {0}")]
    Vision(String),

    /// Machine translation error
    #[error("translation error: {0}")]
    Translation(String),

    /// A stage exceeded its time budget
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error should abort the request instead of degrading
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::EngineConstruction { .. })
    }
}
