//! Engine implementations
//!
//! Available providers:
//! - Whisper (`OpenAI`-compatible) and `PhoWhisper` for speech recognition
//! - A local noise gate for audio cleanup
//! - An HTTP detection service for object detection
//! - `OpenAI` for captioning and speech synthesis
//! - Google Translate for translation and speech synthesis

mod detection;
pub mod google;
mod noise_gate;
pub mod openai;
pub mod pho_whisper;
pub mod whisper;

pub use detection::DetectionService;
pub use google::{GoogleTranslator, GoogleTts};
pub use noise_gate::{NoiseGate, samples_to_wav};
pub use openai::{OpenAiCaptioner, OpenAiTts};
pub use pho_whisper::PhoWhisper;
pub use whisper::WhisperServer;
