//! Recognizer that shells out to an external speech-to-text program.
//!
//! The audio is written to a temporary 16kHz mono WAV file whose path
//! replaces `{input}` in the configured arguments. The program's trimmed
//! stdout is the transcript.

use crate::audio::wav::write_pcm;
use crate::defaults::INPUT_SAMPLE_RATE;
use crate::error::{Result, VoxturnError};
use crate::stt::recognizer::Recognizer;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

/// Placeholder replaced by the path of the audio file.
pub const INPUT_PLACEHOLDER: &str = "{input}";

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// Runs `program args...` once per recognition.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, input: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(INPUT_PLACEHOLDER, &input))
            .collect()
    }

    fn temp_path() -> PathBuf {
        let id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("voxturn-{}-{}.wav", std::process::id(), id))
    }

    fn run(&self, input: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.expand_args(input))
            .output()
            .map_err(|e| VoxturnError::Recognition {
                message: format!("failed to run '{}': {}", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxturnError::Recognition {
                message: format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Recognizer for CommandRecognizer {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let input = Self::temp_path();
        write_pcm(&input, audio, INPUT_SAMPLE_RATE)?;

        let result = self.run(&input);

        if let Err(e) = std::fs::remove_file(&input) {
            tracing::warn!("failed to remove {}: {}", input.display(), e);
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.program
    }

    fn is_ready(&self) -> bool {
        !self.program.is_empty()
    }
}
