//! Speech synthesis backends and silence placeholders.

pub mod command;
pub mod silence;
pub mod synthesizer;
pub mod tone;

pub use command::CommandSynthesizer;
pub use silence::{FailingSilence, SilenceWriter, WavSilence};
pub use synthesizer::{MockSynthesizer, Synthesizer};
pub use tone::ToneSynthesizer;
