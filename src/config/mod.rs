//! Configuration management for the Linda server
//!
//! Values are layered: environment variables override the TOML file, which
//! overrides built-in defaults.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::engines::{SpeechEngine, TtsEngine};
use crate::pipeline::{DEFAULT_HALLUCINATIONS, DEFAULT_VISION_KEYWORDS, VisionMode};
use crate::{Error, Result};

pub use file::LindaConfigFile;

/// Confidence threshold used by the detector unless overridden
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Linda server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Speech recognition configuration
    pub speech: SpeechConfig,

    /// Vision configuration
    pub vision: VisionConfig,

    /// Keywords that mark an utterance as a vision query
    pub vision_keywords: Vec<String>,

    /// Translation configuration
    pub translation: TranslationConfig,

    /// Speech synthesis configuration
    pub tts: TtsConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Upper bound on any single engine stage
    pub stage_timeout: Duration,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum multipart body size in bytes
    pub max_upload_bytes: usize,

    /// Directory where synthesized replies are written, if any
    pub reply_dir: Option<PathBuf>,
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Which speech engine variant to run
    pub engine: SpeechEngine,

    /// Endpoint override (engine default when unset)
    pub url: Option<String>,

    /// Model override (engine default when unset)
    pub model: Option<String>,

    /// Recognition language (ISO 639-1)
    pub language: String,

    /// Run the noise gate before recognition
    pub noise_reduction: bool,

    /// Phrases that mark a transcript as an engine artifact
    pub hallucinations: Vec<String>,
}

/// Vision configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Analysis mode, fixed per deployment
    pub mode: VisionMode,

    /// Object detection service endpoint
    pub detector_url: String,

    /// Minimum detection confidence
    pub confidence: f32,

    /// Captioning endpoint override
    pub caption_url: Option<String>,

    /// Captioning model override
    pub caption_model: Option<String>,
}

/// Translation configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Endpoint override
    pub url: Option<String>,

    /// Language replies are produced in
    pub target_language: String,
}

/// Speech synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Which synthesis engine variant to run
    pub engine: TtsEngine,

    /// Endpoint override
    pub url: Option<String>,

    /// Model override (`OpenAI` only)
    pub model: Option<String>,

    /// Voice identifier (`OpenAI` only)
    pub voice: String,

    /// Speed multiplier (`OpenAI` only)
    pub speed: f64,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, captioning, TTS)
    pub openai: Option<SecretString>,

    /// Hugging Face token (`PhoWhisper`)
    pub huggingface: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                max_upload_bytes: 10 * 1024 * 1024,
                reply_dir: None,
            },
            speech: SpeechConfig {
                engine: SpeechEngine::Whisper,
                url: None,
                model: None,
                language: "vi".to_string(),
                noise_reduction: true,
                hallucinations: to_strings(DEFAULT_HALLUCINATIONS),
            },
            vision: VisionConfig {
                mode: VisionMode::DetectionOnly,
                detector_url: "http://127.0.0.1:8081/detect".to_string(),
                confidence: DEFAULT_CONFIDENCE,
                caption_url: None,
                caption_model: None,
            },
            vision_keywords: to_strings(DEFAULT_VISION_KEYWORDS),
            translation: TranslationConfig {
                url: None,
                target_language: "vi".to_string(),
            },
            tts: TtsConfig {
                engine: TtsEngine::Google,
                url: None,
                model: None,
                voice: "alloy".to_string(),
                speed: 1.0,
            },
            api_keys: ApiKeys::default(),
            stage_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed config file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed
    pub fn from_sources<F>(fc: LindaConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        // Server (env > toml > default)
        let server = ServerConfig {
            host: env("LINDA_HOST")
                .or(fc.server.host)
                .unwrap_or(default.server.host),
            port: parse_env(&env, "LINDA_PORT")?
                .or(parse_env(&env, "PORT")?)
                .or(fc.server.port)
                .unwrap_or(default.server.port),
            max_upload_bytes: parse_env(&env, "LINDA_MAX_UPLOAD_BYTES")?
                .or(fc.server.max_upload_bytes)
                .unwrap_or(default.server.max_upload_bytes),
            reply_dir: env("LINDA_REPLY_DIR")
                .or(fc.server.reply_dir)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        };

        let stage_timeout = parse_env::<u64, _>(&env, "LINDA_STAGE_TIMEOUT_SECS")?
            .or(fc.server.stage_timeout_secs)
            .map_or(default.stage_timeout, Duration::from_secs);
        if stage_timeout.is_zero() {
            return Err(Error::Config(
                "stage timeout must be at least one second".to_string(),
            ));
        }

        // Speech
        let speech = SpeechConfig {
            engine: parse_env(&env, "LINDA_STT_ENGINE")?
                .or(fc.speech.engine)
                .unwrap_or(default.speech.engine),
            url: env("LINDA_STT_URL").or(fc.speech.url),
            model: env("LINDA_STT_MODEL").or(fc.speech.model),
            language: env("LINDA_STT_LANGUAGE")
                .or(fc.speech.language)
                .unwrap_or(default.speech.language),
            noise_reduction: env("LINDA_NOISE_REDUCTION")
                .map(|v| parse_bool(&v))
                .or(fc.speech.noise_reduction)
                .unwrap_or(default.speech.noise_reduction),
            hallucinations: fc
                .speech
                .hallucinations
                .unwrap_or(default.speech.hallucinations),
        };

        // Vision
        let confidence = parse_env(&env, "LINDA_DETECTION_CONFIDENCE")?
            .or(fc.vision.confidence)
            .unwrap_or(default.vision.confidence);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::Config(format!(
                "detection confidence must be within 0..=1, got {confidence}"
            )));
        }
        let vision = VisionConfig {
            mode: parse_env(&env, "LINDA_VISION_MODE")?
                .or(fc.vision.mode)
                .unwrap_or(default.vision.mode),
            detector_url: env("LINDA_DETECTOR_URL")
                .or(fc.vision.detector_url)
                .unwrap_or(default.vision.detector_url),
            confidence,
            caption_url: env("LINDA_CAPTION_URL").or(fc.vision.caption_url),
            caption_model: env("LINDA_CAPTION_MODEL").or(fc.vision.caption_model),
        };

        let vision_keywords = env("LINDA_VISION_KEYWORDS")
            .map(|s| split_list(&s))
            .or(fc.intent.vision_keywords)
            .unwrap_or(default.vision_keywords);

        let translation = TranslationConfig {
            url: env("LINDA_TRANSLATE_URL").or(fc.translation.url),
            target_language: env("LINDA_TARGET_LANGUAGE")
                .or(fc.translation.target_language)
                .unwrap_or(default.translation.target_language),
        };

        let tts = TtsConfig {
            engine: parse_env(&env, "LINDA_TTS_ENGINE")?
                .or(fc.tts.engine)
                .unwrap_or(default.tts.engine),
            url: env("LINDA_TTS_URL").or(fc.tts.url),
            model: env("LINDA_TTS_MODEL").or(fc.tts.model),
            voice: env("LINDA_TTS_VOICE")
                .or(fc.tts.voice)
                .unwrap_or(default.tts.voice),
            speed: parse_env(&env, "LINDA_TTS_SPEED")?
                .or(fc.tts.speed)
                .unwrap_or(default.tts.speed),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            huggingface: env("HF_API_TOKEN")
                .or(fc.api_keys.huggingface)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        Ok(Self {
            server,
            speech,
            vision,
            vision_keywords,
            translation,
            tts,
            api_keys,
            stage_timeout,
        })
    }
}

/// Parse an optional environment value, failing loudly on malformed input
fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}
