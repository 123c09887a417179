use crate::defaults::GENERATION_ERROR_MARKER;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::sync::Arc;
use std::time::Duration;

/// Lazily produced, finite stream of text fragments.
pub type TextStream = BoxStream<'static, String>;

/// Trait for streaming text generation.
///
/// Generators never fail the stream itself: a backend failure is surfaced as
/// a final fragment built with [`error_fragment`], after which the stream ends.
pub trait Generator: Send + Sync {
    /// Start generating a reply to `prompt`.
    fn generate(&self, prompt: &str) -> TextStream;

    /// Get the name of the backing model
    fn model_name(&self) -> &str;
}

impl<T: Generator> Generator for Arc<T> {
    fn generate(&self, prompt: &str) -> TextStream {
        (**self).generate(prompt)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Formats a backend failure as an inline text fragment.
pub fn error_fragment(message: &str) -> String {
    format!("{}{}]", GENERATION_ERROR_MARKER, message)
}

/// Extracts the message of a fragment built by [`error_fragment`].
pub fn parse_error_fragment(fragment: &str) -> Option<&str> {
    fragment
        .trim()
        .strip_prefix(GENERATION_ERROR_MARKER)
        .and_then(|rest| rest.strip_suffix(']'))
}

/// Generator replaying a fixed list of fragments.
///
/// Used for tests and offline demos. The prompt is ignored.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            delay: None,
            failure: None,
        }
    }

    /// Wait this long before yielding each fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// End the stream with an inline failure after the scripted fragments.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, _prompt: &str) -> TextStream {
        let delay = self.delay;
        let fragments = self
            .fragments
            .clone()
            .into_iter()
            .chain(self.failure.as_deref().map(error_fragment));

        stream::iter(fragments)
            .then(move |fragment| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                fragment
            })
            .boxed()
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
