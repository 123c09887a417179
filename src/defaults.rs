//! Default configuration constants for voxturn.
//!
//! Shared by the configuration types and the pipeline components so that a
//! component built without a config file behaves like one built from defaults.

/// Sample rate the recognizer expects for input audio, in Hz.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate of generated clips (silence placeholders, tone synthesis), in Hz.
pub const OUTPUT_SAMPLE_RATE: u32 = 22050;

/// Sentence delimiters, in priority order.
///
/// Full-width CJK punctuation is checked before the ASCII forms.
pub const SENTENCE_DELIMITERS: &[&str] = &["。", "！", "？", ".", "!", "?"];

/// Duration of the silence clip substituted for a failed synthesis, in seconds.
pub const PLACEHOLDER_SECS: f32 = 0.3;

/// How long later clips may wait behind a missing sequence before the missing
/// slot is force-skipped, in milliseconds. Zero disables the watchdog.
pub const STALL_TIMEOUT_MS: u64 = 15_000;

/// Bounded wait used by the playback worker between stop-flag checks.
pub const PLAYBACK_POLL_MS: u64 = 250;

/// Directory (relative to the working directory) holding per-session artifacts.
pub const OUTPUT_DIR: &str = "output";

/// File name of the normalized user recording inside a session directory.
pub const INPUT_FILENAME: &str = "user_input.wav";

/// Prefix of synthesized clip file names (`response_001.wav`, ...).
pub const ARTIFACT_PREFIX: &str = "response";

/// Marker prefix for generator failures surfaced inline in the text stream.
pub const GENERATION_ERROR_MARKER: &str = "[error: ";

/// Default OpenAI-compatible endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Default sampling temperature.
pub const TEMPERATURE: f32 = 0.7;

/// Default completion token limit.
pub const MAX_TOKENS: u32 = 2000;

/// Format a sequence number into the fixed-width clip file name.
///
/// The width is fixed at three digits so lexical order matches playback order
/// for the first 999 sentences of a turn.
pub fn artifact_filename(sequence: u32) -> String {
    format!("{}_{:03}.wav", ARTIFACT_PREFIX, sequence)
}
