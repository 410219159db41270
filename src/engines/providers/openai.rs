//! `OpenAI` engines: image captioning via chat completions and speech synthesis

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::engines::{Captioner, MediaBlob, TextToSpeech};
use crate::{Error, Result};

/// Default chat completions endpoint
pub const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default speech endpoint
pub const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Default captioning model
pub const DEFAULT_CAPTION_MODEL: &str = "gpt-4o-mini";

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

const CAPTION_PROMPT: &str =
    "Describe this scene in one short English sentence, like an image caption. No preamble.";

/// Image captioning through a vision-capable chat model
pub struct OpenAiCaptioner {
    client: Client,
    url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl OpenAiCaptioner {
    /// Create a new captioner
    #[must_use]
    pub fn new(url: String, api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
            model,
            max_tokens: 50,
        }
    }

    /// Check if MIME type is a supported image format
    fn is_supported_image(mime_type: &str) -> bool {
        matches!(
            mime_type,
            "image/png" | "image/jpeg" | "image/gif" | "image/webp"
        )
    }
}

#[async_trait]
impl Captioner for OpenAiCaptioner {
    async fn caption(&self, image: &MediaBlob) -> Result<String> {
        let mime_type = image
            .mime_type
            .as_deref()
            .filter(|m| Self::is_supported_image(m))
            .unwrap_or("image/jpeg");
        let base64_data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let data_url = format!("data:{mime_type};base64,{base64_data}");

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: CAPTION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url,
                            detail: Some("low".to_string()),
                        },
                    },
                ],
            }],
            max_tokens: Some(self.max_tokens),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("caption request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("caption API error: {status} - {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("failed to parse caption response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Vision("empty caption".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai-caption"
    }
}

/// Speech synthesis through the `OpenAI` speech endpoint
pub struct OpenAiTts {
    client: Client,
    url: String,
    api_key: SecretString,
    model: String,
    voice: String,
    speed: f64,
}

impl OpenAiTts {
    /// Create a new `OpenAI` TTS engine
    #[must_use]
    pub fn new(url: String, api_key: SecretString, model: String, voice: String, speed: f64) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
            model,
            voice,
            speed,
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai-tts"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
