//! Restores sequence order between out-of-order synthesis results and playback.
//!
//! Results are held in a sparse map keyed by sequence number. Whenever the
//! slot for `next_expected` is filled, it and every consecutive successor that
//! is already present are released to the playback queue in order. Release and
//! enqueue happen while the lock is held so two releases can never interleave.

use crate::clock::{Clock, SystemClock};
use crate::pipeline::error::{ErrorReporter, LogReporter, PipelineIssue};
use crate::pipeline::playback::PlaybackQueue;
use crate::pipeline::types::{AudioArtifact, FIRST_SEQUENCE, Sequence, TurnId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Result of handing a slot to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The slot was next in line. `count` artifacts went to the playback
    /// queue, including buffered successors freed by the cascade.
    Released { count: usize },
    /// The slot is ahead of `next_expected` and waits in the buffer.
    Buffered,
    /// The slot belongs to an earlier turn or was already released. Dropped.
    Stale,
}

#[derive(Debug)]
enum Slot {
    Ready(AudioArtifact),
    /// Nothing to play; the cascade passes over it.
    Skipped,
}

#[derive(Debug)]
struct ReorderState {
    turn: TurnId,
    next_expected: Sequence,
    pending: BTreeMap<Sequence, Slot>,
    /// When the current gap at `next_expected` started holding back entries.
    blocked_since: Option<Instant>,
}

/// Sequence-ordering buffer in front of the playback queue.
pub struct ReorderBuffer {
    state: Mutex<ReorderState>,
    queue: PlaybackQueue,
    clock: Arc<dyn Clock>,
    stall_timeout: Option<Duration>,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl ReorderBuffer {
    /// Creates an empty buffer releasing into `queue`, with no stall timeout.
    pub fn new(queue: PlaybackQueue) -> Self {
        Self {
            state: Mutex::new(ReorderState {
                turn: TurnId(0),
                next_expected: FIRST_SEQUENCE,
                pending: BTreeMap::new(),
                blocked_since: None,
            }),
            queue,
            clock: Arc::new(SystemClock),
            stall_timeout: None,
            error_reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long buffered entries may wait on a missing slot before that slot
    /// is skipped by [`ReorderBuffer::expire_stalled`]. `None` waits forever.
    pub fn with_stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts a new turn: drops buffered entries, clears the playback queue,
    /// and expects sequence 1 next. Returns the new turn id.
    pub fn reset(&self) -> TurnId {
        let mut state = self.lock();
        state.turn = state.turn.next();
        state.next_expected = FIRST_SEQUENCE;
        let dropped_pending = state.pending.len();
        state.pending.clear();
        state.blocked_since = None;
        let dropped_queued = self.queue.clear();

        tracing::debug!(
            turn = %state.turn,
            dropped_pending,
            dropped_queued,
            "reorder buffer reset"
        );
        state.turn
    }

    /// Hands over a finished artifact.
    pub fn submit(&self, artifact: AudioArtifact) -> SubmitOutcome {
        let turn = artifact.turn;
        let sequence = artifact.sequence;
        self.place(turn, sequence, Slot::Ready(artifact))
    }

    /// Marks a slot as having nothing to play so later slots are not held back.
    pub fn skip(&self, turn: TurnId, sequence: Sequence) -> SubmitOutcome {
        self.place(turn, sequence, Slot::Skipped)
    }

    /// Skips the missing head slot if later entries have waited on it longer
    /// than the stall timeout. Returns the skipped sequence number.
    pub fn expire_stalled(&self) -> Option<Sequence> {
        let timeout = self.stall_timeout?;
        let now = self.clock.now();

        let (sequence, waited) = {
            let mut state = self.lock();
            let since = state.blocked_since?;
            let waited = now.saturating_duration_since(since);
            if waited < timeout {
                return None;
            }

            let sequence = state.next_expected;
            state.next_expected += 1;
            self.cascade(&mut state);
            self.refresh_blocked(&mut state, now);
            (sequence, waited)
        };

        self.error_reporter.report(&PipelineIssue::Stalled {
            sequence,
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        });
        Some(sequence)
    }

    /// The missing head slot and how long later entries have waited on it.
    pub fn stalled_sequence(&self) -> Option<(Sequence, Duration)> {
        let state = self.lock();
        state.blocked_since.map(|since| {
            (
                state.next_expected,
                self.clock.now().saturating_duration_since(since),
            )
        })
    }

    pub fn current_turn(&self) -> TurnId {
        self.lock().turn
    }

    /// Sequence number that must arrive before anything else is released.
    pub fn next_expected(&self) -> Sequence {
        self.lock().next_expected
    }

    /// Entries buffered ahead of `next_expected`.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout
    }

    fn place(&self, turn: TurnId, sequence: Sequence, slot: Slot) -> SubmitOutcome {
        let now = self.clock.now();
        let outcome = {
            let mut state = self.lock();
            if turn != state.turn
                || sequence < state.next_expected
                || state.pending.contains_key(&sequence)
            {
                SubmitOutcome::Stale
            } else if sequence > state.next_expected {
                state.pending.insert(sequence, slot);
                if state.blocked_since.is_none() {
                    state.blocked_since = Some(now);
                }
                SubmitOutcome::Buffered
            } else {
                let count = self.release(&mut state, slot) + self.cascade(&mut state);
                self.refresh_blocked(&mut state, now);
                SubmitOutcome::Released { count }
            }
        };

        if outcome == SubmitOutcome::Stale {
            self.error_reporter
                .report(&PipelineIssue::Stale { sequence });
        }
        outcome
    }

    /// Releases the head slot. Returns 1 if an artifact was enqueued.
    fn release(&self, state: &mut ReorderState, slot: Slot) -> usize {
        state.next_expected += 1;
        match slot {
            Slot::Ready(artifact) => {
                tracing::trace!(clip = %artifact.label(), "released to playback");
                self.queue.push(artifact);
                1
            }
            Slot::Skipped => 0,
        }
    }

    /// Releases every consecutive buffered slot starting at `next_expected`.
    fn cascade(&self, state: &mut ReorderState) -> usize {
        let mut count = 0;
        while let Some(slot) = state.pending.remove(&state.next_expected) {
            count += self.release(state, slot);
        }
        count
    }

    fn refresh_blocked(&self, state: &mut ReorderState, now: Instant) {
        state.blocked_since = if state.pending.is_empty() {
            None
        } else {
            Some(now)
        };
    }

    fn lock(&self) -> MutexGuard<'_, ReorderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Periodically skips stalled slots until the returned task is aborted.
///
/// Must be called from within a tokio runtime.
pub fn spawn_stall_watchdog(
    buffer: Arc<ReorderBuffer>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            while buffer.expire_stalled().is_some() {}
        }
    })
}
