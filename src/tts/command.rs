//! Synthesizer that runs an external text-to-speech program per sentence.
//!
//! Arguments may contain `{text}`, `{output}` and `{voice}` placeholders. The
//! program must write a WAV file to the `{output}` path.

use crate::error::{Result, VoxturnError};
use crate::tts::synthesizer::Synthesizer;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

pub const TEXT_PLACEHOLDER: &str = "{text}";
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
pub const VOICE_PLACEHOLDER: &str = "{voice}";

#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    voice: String,
    timeout: Option<Duration>,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            voice: String::new(),
            timeout: None,
        }
    }

    /// Voice identifier substituted for `{voice}`.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Kill the program and fail the sentence after this long.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn expand_args(&self, text: &str, target: &Path) -> Vec<String> {
        let output = target.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(TEXT_PLACEHOLDER, text)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(VOICE_PLACEHOLDER, &self.voice)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(self.expand_args(text, target)).kill_on_drop(true);

        let run = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                VoxturnError::Synthesis {
                    message: format!("'{}' timed out after {:?}", self.program, limit),
                }
            })?,
            None => run.await,
        }
        .map_err(|e| VoxturnError::Synthesis {
            message: format!("failed to run '{}': {}", self.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoxturnError::Synthesis {
                message: format!(
                    "'{}' exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let written = tokio::fs::metadata(target)
            .await
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        if !written {
            return Err(VoxturnError::Synthesis {
                message: format!("'{}' did not write {}", self.program, target.display()),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.program
    }
}
