//! Built-in synthesizer that renders each word as a short beep.
//!
//! Needs no external engine, which makes it useful for demos and for
//! checking playback order by ear.

use crate::audio::wav::{sample_count, write_pcm};
use crate::defaults::OUTPUT_SAMPLE_RATE;
use crate::error::{Result, VoxturnError};
use crate::tts::synthesizer::Synthesizer;
use std::f32::consts::TAU;
use std::path::Path;

const WORD_SECS: f32 = 0.12;
const GAP_SECS: f32 = 0.04;
const AMPLITUDE: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: u32,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Render one beep per word; pitch rises with word length.
    pub fn render(&self, text: &str) -> Vec<i16> {
        let word_len = sample_count(self.sample_rate, WORD_SECS);
        let gap_len = sample_count(self.sample_rate, GAP_SECS);
        let mut samples = Vec::new();

        for word in text.split_whitespace() {
            let freq = 330.0 + 40.0 * word.chars().count().min(20) as f32;
            samples.extend((0..word_len).map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                // Short linear fade at both ends avoids clicks
                let edge = (i.min(word_len - 1 - i) as f32 / 200.0).min(1.0);
                ((TAU * freq * t).sin() * AMPLITUDE * edge * i16::MAX as f32) as i16
            }));
            samples.extend(std::iter::repeat_n(0i16, gap_len));
        }
        samples
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(OUTPUT_SAMPLE_RATE)
    }
}

#[async_trait::async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, target: &Path) -> Result<()> {
        let samples = self.render(text);
        if samples.is_empty() {
            return Err(VoxturnError::Synthesis {
                message: "nothing to say".to_string(),
            });
        }

        let target = target.to_path_buf();
        let sample_rate = self.sample_rate;
        tokio::task::spawn_blocking(move || write_pcm(&target, &samples, sample_rate))
            .await
            .map_err(|e| VoxturnError::Synthesis {
                message: format!("tone writer task failed: {}", e),
            })?
    }

    fn name(&self) -> &str {
        "tone"
    }
}
