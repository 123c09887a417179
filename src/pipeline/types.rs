//! Data types flowing through the synthesis and playback pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Position of a sentence within its turn. Starts at 1.
pub type Sequence = u32;

/// First sequence number of every turn.
pub const FIRST_SEQUENCE: Sequence = 1;

/// Identifies one conversational turn.
///
/// Artifacts carry the turn they were produced for so that results arriving
/// after a reset can be recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl TurnId {
    /// The turn following this one.
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// A complete sentence recognized by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Sentence text, including its terminator when it has one.
    pub text: String,
    /// Playback position, assigned when the sentence was recognized as complete.
    pub sequence: Sequence,
    /// Delimiter that ended the sentence; `None` for an end-of-stream flush.
    pub terminator: Option<String>,
}

impl Sentence {
    /// Creates a sentence.
    pub fn new(text: impl Into<String>, sequence: Sequence, terminator: Option<String>) -> Self {
        Self {
            text: text.into(),
            sequence,
            terminator,
        }
    }
}

/// Where the audio of an artifact lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    /// A WAV file on disk.
    File(PathBuf),
    /// Mono 16-bit PCM held in memory.
    Pcm {
        samples: Arc<Vec<i16>>,
        sample_rate: u32,
    },
}

impl Clip {
    /// Path of the clip, if it is file-backed.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Clip::File(path) => Some(path),
            Clip::Pcm { .. } => None,
        }
    }
}

/// How an artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Output of a successful synthesis job.
    Speech,
    /// Fixed-length silence substituted for a failed synthesis job.
    Silence,
}

/// Audio for one sentence, ready to be ordered and played.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub turn: TurnId,
    pub sequence: Sequence,
    pub clip: Clip,
    pub kind: ArtifactKind,
}

impl AudioArtifact {
    /// Creates an artifact for synthesized speech stored at `path`.
    pub fn speech(turn: TurnId, sequence: Sequence, path: PathBuf) -> Self {
        Self {
            turn,
            sequence,
            clip: Clip::File(path),
            kind: ArtifactKind::Speech,
        }
    }

    /// Creates an artifact for a silence placeholder stored at `path`.
    pub fn silence(turn: TurnId, sequence: Sequence, path: PathBuf) -> Self {
        Self {
            turn,
            sequence,
            clip: Clip::File(path),
            kind: ArtifactKind::Silence,
        }
    }

    /// Short label for logs: `turn-3#002`.
    pub fn label(&self) -> String {
        format!("{}#{:03}", self.turn, self.sequence)
    }
}
