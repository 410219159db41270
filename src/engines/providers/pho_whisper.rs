//! `PhoWhisper` transcription via the Hugging Face inference API
//!
//! The inference API accepts the raw audio body and returns `{"text": ...}`.
//! Decoding options other than the language are fixed server-side.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::engines::{DecodingOptions, MediaBlob, SpeechToText};
use crate::{Error, Result};

/// Default inference endpoint for the large Vietnamese model
pub const DEFAULT_URL: &str = "https://api-inference.huggingface.co/models/vinai/PhoWhisper-large";

/// `PhoWhisper` transcription engine
pub struct PhoWhisper {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl PhoWhisper {
    /// Create a new `PhoWhisper` engine
    #[must_use]
    pub fn new(url: String, token: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            url,
            token,
        }
    }
}

#[async_trait]
impl SpeechToText for PhoWhisper {
    async fn transcribe(&self, audio: &MediaBlob, _options: &DecodingOptions) -> Result<String> {
        tracing::debug!(audio_bytes = audio.bytes.len(), "starting PhoWhisper transcription");

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", audio.mime_or("audio/mpeg"))
            .body(audio.bytes.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "PhoWhisper API error");
            return Err(Error::Stt(format!("PhoWhisper API error {status}: {body}")));
        }

        let result: InferenceResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse PhoWhisper response: {e}")))?;

        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "pho-whisper"
    }
}

#[derive(Deserialize)]
struct InferenceResponse {
    text: String,
}
