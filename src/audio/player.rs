use crate::error::{Result, VoxturnError};
use crate::pipeline::types::{ArtifactKind, AudioArtifact, Sequence, TurnId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Trait for audio output.
///
/// This trait allows swapping implementations (real output device vs mock).
pub trait ClipPlayer: Send + Sync {
    /// Play one clip to completion.
    ///
    /// Implementations must return early once `keep_playing` turns false so
    /// that stopping the playback worker aborts the current clip.
    fn play(&self, artifact: &AudioArtifact, keep_playing: &AtomicBool) -> Result<()>;

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "player"
    }
}

/// Player that discards every clip immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlayer;

impl ClipPlayer for NullPlayer {
    fn play(&self, artifact: &AudioArtifact, _keep_playing: &AtomicBool) -> Result<()> {
        tracing::debug!(clip = %artifact.label(), "null player discarding clip");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// A clip as seen by [`MockPlayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedClip {
    pub turn: TurnId,
    pub sequence: Sequence,
    pub kind: ArtifactKind,
    /// False when playback was aborted by a stop request.
    pub completed: bool,
}

/// Mock player for testing: records clips in play order.
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    played: Arc<Mutex<Vec<PlayedClip>>>,
    duration: Duration,
    fail_on: HashSet<Sequence>,
}

impl MockPlayer {
    /// Create a mock player that finishes every clip instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure how long each clip takes to "play".
    pub fn with_clip_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Configure the mock to fail when asked to play `sequence`.
    pub fn with_failure_on(mut self, sequence: Sequence) -> Self {
        self.fail_on.insert(sequence);
        self
    }

    /// Clips played so far, in play order.
    pub fn played(&self) -> Vec<PlayedClip> {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Sequence numbers played so far, in play order.
    pub fn sequences(&self) -> Vec<Sequence> {
        self.played().iter().map(|clip| clip.sequence).collect()
    }
}

impl ClipPlayer for MockPlayer {
    fn play(&self, artifact: &AudioArtifact, keep_playing: &AtomicBool) -> Result<()> {
        if self.fail_on.contains(&artifact.sequence) {
            return Err(VoxturnError::Playback {
                message: format!("mock playback failure for {}", artifact.label()),
            });
        }

        let step = Duration::from_millis(5);
        let mut remaining = self.duration;
        let mut completed = true;
        while !remaining.is_zero() {
            if !keep_playing.load(Ordering::SeqCst) {
                completed = false;
                break;
            }
            let slice = remaining.min(step);
            thread::sleep(slice);
            remaining -= slice;
        }

        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PlayedClip {
                turn: artifact.turn,
                sequence: artifact.sequence,
                kind: artifact.kind,
                completed,
            });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
