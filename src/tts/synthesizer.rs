use crate::audio::wav::write_pcm;
use crate::error::{Result, VoxturnError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for text-to-speech synthesis.
///
/// One call renders one sentence into a WAV file at `target`. Calls for
/// different sentences run concurrently, so implementations must not rely
/// on call order.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render `text` to a WAV file at `target`, replacing any existing file.
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
impl<T: Synthesizer> Synthesizer for Arc<T> {
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        (**self).synthesize(text, target).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing.
///
/// Per-sentence delays make completion order controllable; failures and
/// panics can be injected for specific sentences.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    default_delay: Duration,
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    write_files: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to sentences without their own delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Make synthesis of `text` take `delay`.
    pub fn with_delay_for(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// Make synthesis of `text` return an error.
    pub fn with_failure_for(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }

    /// Make synthesis of `text` panic.
    pub fn with_panic_for(mut self, text: &str) -> Self {
        self.panics.insert(text.to_string());
        self
    }

    /// Write a short clip to the target path on success.
    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    /// Texts requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());

        let delay = self
            .delays
            .get(text)
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panics.contains(text) {
            panic!("mock synthesizer panic for {:?}", text);
        }
        if self.failures.contains(text) {
            return Err(VoxturnError::Synthesis {
                message: format!("mock synthesis failure for {:?}", text),
            });
        }
        if self.write_files {
            write_pcm(target, &[0, 512, 0, -512], 8000)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
