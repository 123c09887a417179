//! voxturn - Voice assistant with ordered streaming speech output
//!
//! Recognizes a spoken question, streams the generated reply, and speaks it
//! sentence by sentence while the rest is still being written.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod stt;
pub mod tts;

// Composition root
#[cfg(feature = "cli")]
pub mod app;

// Capability traits (recognize → generate → synthesize → play)
pub use audio::player::ClipPlayer;
pub use llm::generator::Generator;
pub use stt::recognizer::Recognizer;
pub use tts::silence::SilenceWriter;
pub use tts::synthesizer::Synthesizer;

// Pipeline
pub use pipeline::orchestrator::{Assistant, Backends, PipelineConfig, TurnSummary};
pub use pipeline::events::{EventSink, TurnEvent};

// Error handling
pub use error::{Result, VoxturnError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
