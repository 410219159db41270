//! Whisper transcription over an `OpenAI`-compatible endpoint

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::engines::{DecodingOptions, MediaBlob, SpeechToText};
use crate::{Error, Result};

/// Default transcription endpoint
pub const DEFAULT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Whisper transcription engine
///
/// Works against the hosted `OpenAI` API as well as self-hosted servers that
/// speak the same multipart protocol (which also honour the beam/best-of
/// fields).
pub struct WhisperServer {
    client: Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl WhisperServer {
    /// Create a new Whisper engine
    #[must_use]
    pub fn new(url: String, model: String, api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            url,
            model,
            api_key,
        }
    }

    /// Get file extension for MIME type
    fn extension_for_mime(mime_type: &str) -> &'static str {
        match mime_type {
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/flac" => "flac",
            _ => "mp3",
        }
    }

    /// Multipart form for one transcription request
    fn form(&self, audio: &MediaBlob, options: &DecodingOptions) -> Result<Form> {
        let mime_type = audio.mime_or("audio/mpeg");
        let filename = audio.file_name.clone().unwrap_or_else(|| {
            format!("audio.{}", Self::extension_for_mime(mime_type))
        });

        let part = Part::bytes(audio.bytes.clone())
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| Error::Stt(format!("invalid MIME type: {e}")))?;

        Ok(Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", options.language.clone())
            .text("response_format", "json")
            .text("temperature", options.temperature.to_string())
            .text("beam_size", options.beam_size.to_string())
            .text("best_of", options.best_of.to_string())
            .text(
                "condition_on_previous_text",
                options.condition_on_previous_text.to_string(),
            ))
    }
}

#[async_trait]
impl SpeechToText for WhisperServer {
    async fn transcribe(&self, audio: &MediaBlob, options: &DecodingOptions) -> Result<String> {
        tracing::debug!(audio_bytes = audio.bytes.len(), "starting Whisper transcription");

        let mut request = self.client.post(&self.url).multipart(self.form(audio, options)?);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Whisper request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse Whisper response: {e}")))?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}
