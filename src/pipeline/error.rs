//! Per-stage issues and the reporters that log and collect them.
//!
//! Failures local to one sentence never abort a turn. They are turned into a
//! [`PipelineIssue`], logged, and appended to the log of the turn they belong
//! to so the caller can inspect what degraded.

use crate::pipeline::types::Sequence;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A non-fatal problem observed by one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineIssue {
    /// The generator failed; its error was surfaced inline in the text stream.
    Generation { message: String },
    /// Synthesis failed and a silence placeholder was substituted.
    Synthesis { sequence: Sequence, message: String },
    /// Both synthesis and the placeholder failed; the slot was skipped.
    Placeholder { sequence: Sequence, message: String },
    /// A clip could not be played; the worker moved on.
    Playback { sequence: Sequence, message: String },
    /// A result arrived for a turn or slot that was already finished.
    Stale { sequence: Sequence },
    /// Playback waited on a missing slot past the stall timeout and skipped it.
    Stalled { sequence: Sequence, waited_ms: u64 },
}

impl PipelineIssue {
    /// Sequence number the issue refers to, if any.
    pub fn sequence(&self) -> Option<Sequence> {
        match self {
            PipelineIssue::Generation { .. } => None,
            PipelineIssue::Synthesis { sequence, .. }
            | PipelineIssue::Placeholder { sequence, .. }
            | PipelineIssue::Playback { sequence, .. }
            | PipelineIssue::Stale { sequence }
            | PipelineIssue::Stalled { sequence, .. } => Some(*sequence),
        }
    }

    /// True when the user hears a gap instead of the intended sentence.
    pub fn is_audible(&self) -> bool {
        !matches!(
            self,
            PipelineIssue::Generation { .. } | PipelineIssue::Stale { .. }
        )
    }
}

impl fmt::Display for PipelineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineIssue::Generation { message } => write!(f, "generation failed: {}", message),
            PipelineIssue::Synthesis { sequence, message } => {
                write!(f, "[{:03}] synthesis failed, using silence: {}", sequence, message)
            }
            PipelineIssue::Placeholder { sequence, message } => {
                write!(f, "[{:03}] placeholder failed, slot skipped: {}", sequence, message)
            }
            PipelineIssue::Playback { sequence, message } => {
                write!(f, "[{:03}] playback failed: {}", sequence, message)
            }
            PipelineIssue::Stale { sequence } => {
                write!(f, "[{:03}] stale result dropped", sequence)
            }
            PipelineIssue::Stalled {
                sequence,
                waited_ms,
            } => write!(
                f,
                "[{:03}] stuck for {}ms, skipped to keep playback moving",
                sequence, waited_ms
            ),
        }
    }
}

/// Trait for reporting pipeline issues.
pub trait ErrorReporter: Send + Sync {
    /// Reports an issue observed by a stage.
    fn report(&self, issue: &PipelineIssue);
}

/// Reporter that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, issue: &PipelineIssue) {
        log_issue(issue);
    }
}

fn log_issue(issue: &PipelineIssue) {
    match issue {
        PipelineIssue::Stale { .. } => tracing::warn!(%issue, "dropping stale result"),
        PipelineIssue::Placeholder { .. } | PipelineIssue::Stalled { .. } => {
            tracing::error!(%issue, "playback slot lost")
        }
        _ => tracing::warn!(%issue, "pipeline degraded"),
    }
}

/// Structured log of the issues observed during one turn.
///
/// Cheap to clone; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct TurnLog {
    issues: Arc<Mutex<Vec<PipelineIssue>>>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue without logging it.
    pub fn record(&self, issue: PipelineIssue) {
        self.lock().push(issue);
    }

    /// Copy of the issues recorded so far, in report order.
    pub fn snapshot(&self) -> Vec<PipelineIssue> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PipelineIssue>> {
        self.issues.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ErrorReporter for TurnLog {
    fn report(&self, issue: &PipelineIssue) {
        log_issue(issue);
        self.record(issue.clone());
    }
}

/// Reporter shared by the long-lived components (reorder buffer, playback
/// worker). Logs every issue and routes it into the log of the active turn.
#[derive(Debug, Default)]
pub struct ActiveTurnReporter {
    current: Mutex<Option<TurnLog>>,
}

impl ActiveTurnReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes subsequent issues into `log`.
    pub fn begin(&self, log: TurnLog) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(log);
    }

    /// The log currently receiving issues.
    pub fn current(&self) -> Option<TurnLog> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ErrorReporter for ActiveTurnReporter {
    fn report(&self, issue: &PipelineIssue) {
        log_issue(issue);
        if let Some(log) = self.current() {
            log.record(issue.clone());
        }
    }
}
