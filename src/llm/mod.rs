//! Streaming text generation backends.

pub mod generator;
#[cfg(feature = "llm")]
pub mod openai;

pub use generator::{Generator, ScriptedGenerator, TextStream, error_fragment};
#[cfg(feature = "llm")]
pub use openai::{OpenAiGenerator, OpenAiSettings};
