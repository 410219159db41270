//! TOML configuration file loading
//!
//! Supports `~/.config/linda/config.toml` (or the path in `LINDA_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engines::{SpeechEngine, TtsEngine};
use crate::pipeline::VisionMode;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct LindaConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Vision configuration
    #[serde(default)]
    pub vision: VisionFileConfig,

    /// Intent keyword configuration
    #[serde(default)]
    pub intent: IntentFileConfig,

    /// Translation configuration
    #[serde(default)]
    pub translation: TranslationFileConfig,

    /// Speech synthesis configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Maximum multipart body size in bytes
    pub max_upload_bytes: Option<usize>,
    /// Directory where synthesized replies are kept
    pub reply_dir: Option<String>,
    /// Per-stage time budget in seconds
    pub stage_timeout_secs: Option<u64>,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    pub engine: Option<SpeechEngine>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub noise_reduction: Option<bool>,
    /// Phrases that mark a transcript as an engine artifact
    pub hallucinations: Option<Vec<String>>,
}

/// Vision configuration
#[derive(Debug, Default, Deserialize)]
pub struct VisionFileConfig {
    pub mode: Option<VisionMode>,
    pub detector_url: Option<String>,
    pub confidence: Option<f32>,
    pub caption_url: Option<String>,
    pub caption_model: Option<String>,
}

/// Intent classification configuration
#[derive(Debug, Default, Deserialize)]
pub struct IntentFileConfig {
    pub vision_keywords: Option<Vec<String>>,
}

/// Translation configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranslationFileConfig {
    pub url: Option<String>,
    pub target_language: Option<String>,
}

/// Speech synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub engine: Option<TtsEngine>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub huggingface: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `LindaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> LindaConfigFile {
    let path = std::env::var("LINDA_CONFIG")
        .ok()
        .map(PathBuf::from)
        .or_else(config_file_path);

    let Some(path) = path else {
        return LindaConfigFile::default();
    };

    if !path.exists() {
        return LindaConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            LindaConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> crate::Result<LindaConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/linda/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("linda").join("config.toml"))
}
