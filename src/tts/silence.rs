//! Silence placeholders substituted for sentences whose synthesis failed.

use crate::audio::wav::write_silence;
use crate::defaults;
use crate::error::{Result, VoxturnError};
use std::path::Path;

/// Writes a fixed-length silent clip.
pub trait SilenceWriter: Send + Sync {
    fn write_silence(&self, target: &Path) -> Result<()>;
}

/// Mono 16-bit silence of a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct WavSilence {
    sample_rate: u32,
    secs: f32,
}

impl WavSilence {
    pub fn new(sample_rate: u32, secs: f32) -> Self {
        Self { sample_rate, secs }
    }

    pub fn secs(&self) -> f32 {
        self.secs
    }
}

impl Default for WavSilence {
    fn default() -> Self {
        Self::new(defaults::OUTPUT_SAMPLE_RATE, defaults::PLACEHOLDER_SECS)
    }
}

impl SilenceWriter for WavSilence {
    fn write_silence(&self, target: &Path) -> Result<()> {
        write_silence(target, self.sample_rate, self.secs).map_err(|e| VoxturnError::Placeholder {
            path: target.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Silence writer that always fails, for exercising the skip path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSilence;

impl SilenceWriter for FailingSilence {
    fn write_silence(&self, target: &Path) -> Result<()> {
        Err(VoxturnError::Placeholder {
            path: target.display().to_string(),
            message: "placeholder writer disabled".to_string(),
        })
    }
}
