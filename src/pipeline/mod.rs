//! Ordered streaming speech pipeline.
//!
//! Generated text is cut into sentences as it streams in, each sentence is
//! synthesized by its own concurrent job, and a reorder buffer hands the
//! clips to a single playback worker strictly in sentence order.

pub mod dispatcher;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod playback;
pub mod reorder;
pub mod segmenter;
pub mod types;

pub use dispatcher::SynthesisDispatcher;
pub use error::{ActiveTurnReporter, ErrorReporter, LogReporter, PipelineIssue, TurnLog};
pub use events::{CollectingSink, EventSink, NullSink, TurnEvent};
pub use orchestrator::{
    Assistant, Backends, PipelineConfig, PipelineStatus, TurnReport, TurnSummary,
};
pub use playback::{PlaybackQueue, PlaybackWorker};
pub use reorder::{ReorderBuffer, SubmitOutcome, spawn_stall_watchdog};
pub use segmenter::{Segmenter, SplitPolicy};
pub use types::{
    ArtifactKind, AudioArtifact, Clip, FIRST_SEQUENCE, Sentence, Sequence, TurnId,
};
