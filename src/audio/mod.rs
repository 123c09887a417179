//! Audio decoding, encoding and output.

#[cfg(feature = "cpal-audio")]
pub mod output;
pub mod player;
pub mod wav;

pub use player::{ClipPlayer, MockPlayer, NullPlayer};
