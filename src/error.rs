//! Error types for voxturn.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxturnError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Input audio errors
    #[error("Audio input error: {message}")]
    AudioInput { message: String },

    // Recognition errors
    #[error("Speech recognition failed: {message}")]
    Recognition { message: String },

    #[error("Speech recognition returned no text")]
    EmptyTranscript,

    // Generation errors
    #[error("Text generation failed: {message}")]
    Generation { message: String },

    // Synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("Silence placeholder could not be written to {path}: {message}")]
    Placeholder { path: String, message: String },

    // Playback errors
    #[error("Audio output device not found: {device}")]
    OutputDeviceNotFound { device: String },

    #[error("Playback failed: {message}")]
    Playback { message: String },

    // Session storage errors
    #[error("Session storage error: {message}")]
    Session { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VoxturnError>;
