//! Linda - voice and vision assistant server
//!
//! This library provides the request pipeline behind the Linda assistant:
//! - Speech recognition with noise reduction and hallucination filtering
//! - Keyword intent detection
//! - Scene analysis (object detection, captioning, distance estimation)
//! - Templated Vietnamese replies and speech synthesis
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    HTTP API                          │
//! │   POST /chat-multimodal  │  /health  │  /ready      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               RequestOrchestrator                    │
//! │  Transcribe │ Intent │ Vision │ Compose │ Synthesize │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 ModelRegistry                        │
//! │   STT  │  Denoise  │  Detect  │  Caption  │  TTS    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod engines;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use api::{ApiServer, ApiState};
pub use config::Config;
pub use engines::{ConfiguredEngines, EngineFactory, EngineKind};
pub use error::{Error, Result};
pub use pipeline::{ChatResponse, IncomingRequest, RequestOrchestrator};
pub use registry::ModelRegistry;
