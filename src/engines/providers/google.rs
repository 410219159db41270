//! Google Translate engines: text translation and speech synthesis
//!
//! Both use the public endpoints behind translate.google.com. The speech
//! endpoint caps each request at 100 characters, so longer replies are split
//! on word boundaries and the MP3 segments concatenated.

use async_trait::async_trait;
use reqwest::Client;

use crate::engines::{TextToSpeech, Translator};
use crate::{Error, Result};

/// Default translation endpoint
pub const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Default speech endpoint
pub const TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Maximum characters per speech request
const TTS_MAX_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

/// Google Translate client
pub struct GoogleTranslator {
    client: Client,
    url: String,
}

impl GoogleTranslator {
    /// Create a new translator
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| Error::Translation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Translation(format!("API error {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Translation(format!("parse error: {e}")))?;

        parse_translation(&body)
    }

    fn name(&self) -> &'static str {
        "google-translate"
    }
}

/// Join the translated segments of a `translate_a/single` response
fn parse_translation(body: &serde_json::Value) -> Result<String> {
    let translated: String = body
        .get(0)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::Translation("unexpected response shape".to_string()))?
        .iter()
        .filter_map(|segment| segment.get(0).and_then(serde_json::Value::as_str))
        .collect();

    let translated = translated.trim();
    if translated.is_empty() {
        return Err(Error::Translation("empty translation".to_string()));
    }
    Ok(translated.to_string())
}

/// Google Translate speech synthesis
pub struct GoogleTts {
    client: Client,
    url: String,
    language: String,
}

impl GoogleTts {
    /// Create a new Google TTS engine speaking `language`
    #[must_use]
    pub fn new(url: String, language: String) -> Self {
        Self {
            client: Client::new(),
            url,
            language,
        }
    }
}

#[async_trait]
impl TextToSpeech for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_text(text, TTS_MAX_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&self.url)
                .header("User-Agent", USER_AGENT)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "google-tts"
    }
}

/// Split text into chunks of at most `max_chars` characters on whitespace
///
/// Words longer than `max_chars` are split mid-word.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
