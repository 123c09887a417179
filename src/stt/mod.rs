//! Speech recognition backends.

pub mod command;
pub mod recognizer;

pub use command::CommandRecognizer;
pub use recognizer::{MockRecognizer, Recognizer};
