//! Splits an incremental text stream into complete sentences.
//!
//! Text is accumulated in a single carry-over buffer. Every `feed` appends the
//! new chunk and emits whatever sentences became complete; the trailing partial
//! remainder stays buffered until more text arrives or `flush` is called at
//! end of stream. Sequence numbers are assigned here, at the moment a sentence
//! is recognized as complete, so emission order is sequence order.

use crate::defaults;
use crate::pipeline::types::{FIRST_SEQUENCE, Sentence, Sequence};
use serde::{Deserialize, Serialize};

/// How the buffer is split when it contains delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitPolicy {
    /// Split on the first configured delimiter present in the buffer, and only
    /// on that one for this feed. A buffer holding "Really? Yes." with "."
    /// listed before "?" yields the single sentence "Really? Yes.".
    #[default]
    FirstConfigured,
    /// Split at the earliest delimiter occurrence of any type, repeatedly.
    Earliest,
}

/// Incremental sentence segmenter.
#[derive(Debug, Clone)]
pub struct Segmenter {
    delimiters: Vec<String>,
    policy: SplitPolicy,
    buffer: String,
    next_sequence: Sequence,
}

impl Segmenter {
    /// Creates a segmenter with the given delimiters in priority order.
    ///
    /// Empty delimiter strings are ignored.
    pub fn new<I, S>(delimiters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            delimiters: delimiters
                .into_iter()
                .map(Into::into)
                .filter(|d: &String| !d.is_empty())
                .collect(),
            policy: SplitPolicy::default(),
            buffer: String::new(),
            next_sequence: FIRST_SEQUENCE,
        }
    }

    /// Sets the split policy.
    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Appends `chunk` and returns the sentences it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<Sentence> {
        self.buffer.push_str(chunk);
        match self.policy {
            SplitPolicy::FirstConfigured => self.split_first_configured(),
            SplitPolicy::Earliest => self.split_earliest(),
        }
    }

    /// Emits the buffered remainder as a final sentence without terminator.
    ///
    /// Returns `None` when the remainder is empty or whitespace.
    pub fn flush(&mut self) -> Option<Sentence> {
        let remainder = std::mem::take(&mut self.buffer);
        let text = remainder.trim();
        if text.is_empty() {
            return None;
        }
        Some(self.assign(text.to_string(), None))
    }

    /// Drops buffered text and restarts numbering at 1 for a new turn.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.next_sequence = FIRST_SEQUENCE;
    }

    /// Text received but not yet part of a complete sentence.
    pub fn pending_text(&self) -> &str {
        &self.buffer
    }

    /// Sequence number the next completed sentence will receive.
    pub fn next_sequence(&self) -> Sequence {
        self.next_sequence
    }

    fn split_first_configured(&mut self) -> Vec<Sentence> {
        let Some(delimiter) = self
            .delimiters
            .iter()
            .find(|d| self.buffer.contains(d.as_str()))
            .cloned()
        else {
            return Vec::new();
        };

        let buffer = std::mem::take(&mut self.buffer);
        let mut pieces: Vec<&str> = buffer.split(delimiter.as_str()).collect();
        // split() on a present delimiter always yields at least two pieces
        let remainder = pieces.pop().unwrap_or_default().to_string();

        let mut sentences = Vec::new();
        for piece in pieces {
            if let Some(sentence) = self.complete(piece, &delimiter) {
                sentences.push(sentence);
            }
        }
        self.buffer = remainder;
        sentences
    }

    fn split_earliest(&mut self) -> Vec<Sentence> {
        let mut sentences = Vec::new();
        loop {
            let earliest = self
                .delimiters
                .iter()
                .filter_map(|d| self.buffer.find(d.as_str()).map(|pos| (pos, d.clone())))
                .min_by_key(|(pos, _)| *pos);

            let Some((pos, delimiter)) = earliest else {
                break;
            };

            let rest = self.buffer.split_off(pos + delimiter.len());
            let head = std::mem::replace(&mut self.buffer, rest);
            let piece = &head[..pos];
            if let Some(sentence) = self.complete(piece, &delimiter) {
                sentences.push(sentence);
            }
        }
        sentences
    }

    fn complete(&mut self, piece: &str, delimiter: &str) -> Option<Sentence> {
        let text = piece.trim();
        if text.is_empty() {
            return None;
        }
        Some(self.assign(
            format!("{}{}", text, delimiter),
            Some(delimiter.to_string()),
        ))
    }

    fn assign(&mut self, text: String, terminator: Option<String>) -> Sentence {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Sentence::new(text, sequence, terminator)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(defaults::SENTENCE_DELIMITERS.iter().copied())
    }
}
