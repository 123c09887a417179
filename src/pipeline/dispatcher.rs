//! Fans completed sentences out to concurrent synthesis jobs.
//!
//! Every sentence gets its own tokio task, started the moment the segmenter
//! reports it. Jobs run in parallel and finish in any order; the reorder
//! buffer restores sequence order. A failed job is replaced by a silence
//! placeholder in the same slot, and if even that fails the slot is skipped.

use crate::pipeline::error::{ErrorReporter, PipelineIssue};
use crate::pipeline::reorder::ReorderBuffer;
use crate::pipeline::types::{AudioArtifact, Sentence, Sequence, TurnId};
use crate::session::TurnDir;
use crate::tts::silence::SilenceWriter;
use crate::tts::synthesizer::Synthesizer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;

/// Shared state cloned into every job.
#[derive(Clone)]
struct JobContext {
    turn: TurnId,
    synthesizer: Arc<dyn Synthesizer>,
    silence: Arc<dyn SilenceWriter>,
    buffer: Arc<ReorderBuffer>,
    error_reporter: Arc<dyn ErrorReporter>,
    limiter: Option<Arc<Semaphore>>,
}

/// Counts one job as in flight until dropped, even if the job never ran.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn new(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Resolves once every job dispatched before it was taken has finished.
///
/// Holds no reference to the dispatcher, so it can be awaited while the
/// dispatcher itself is replaced or dropped.
#[derive(Debug, Clone)]
pub struct IdleSignal(watch::Receiver<usize>);

impl IdleSignal {
    pub async fn wait(mut self) {
        // A closed channel means every job and the dispatcher are gone
        if self.0.wait_for(|&n| n == 0).await.is_err() {
            tracing::trace!("dispatcher dropped with its jobs finished");
        }
    }
}

/// Dispatches the sentences of one turn.
///
/// Dropping the dispatcher detaches its jobs rather than cancelling them;
/// their results are then discarded by the reorder buffer as stale once a new
/// turn has started.
pub struct SynthesisDispatcher {
    ctx: JobContext,
    turn_dir: TurnDir,
    jobs: JoinSet<()>,
    outstanding: Arc<watch::Sender<usize>>,
    dispatched: u32,
    last_sequence: Option<Sequence>,
}

impl SynthesisDispatcher {
    pub fn new(
        turn: TurnId,
        turn_dir: TurnDir,
        synthesizer: Arc<dyn Synthesizer>,
        silence: Arc<dyn SilenceWriter>,
        buffer: Arc<ReorderBuffer>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            ctx: JobContext {
                turn,
                synthesizer,
                silence,
                buffer,
                error_reporter,
                limiter: None,
            },
            turn_dir,
            jobs: JoinSet::new(),
            outstanding: Arc::new(watch::Sender::new(0)),
            dispatched: 0,
            last_sequence: None,
        }
    }

    /// Caps how many synthesis calls run at once. `None` or zero is unbounded.
    pub fn with_max_concurrent(mut self, limit: Option<usize>) -> Self {
        self.ctx.limiter = limit.filter(|&n| n > 0).map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    /// Starts synthesis of `sentence` and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_sentence_complete(&mut self, sentence: Sentence) {
        if let Some(last) = self.last_sequence
            && sentence.sequence <= last
        {
            tracing::warn!(
                sequence = sentence.sequence,
                last,
                "sentence dispatched out of order"
            );
        }
        self.last_sequence = Some(sentence.sequence);
        self.dispatched += 1;

        let target = self.turn_dir.artifact_path(sentence.sequence);
        tracing::debug!(
            turn = %self.ctx.turn,
            sequence = sentence.sequence,
            text = %sentence.text,
            "dispatching synthesis"
        );
        let in_flight = InFlight::new(self.outstanding.clone());
        let job = run_job(self.ctx.clone(), sentence, target);
        self.jobs.spawn(async move {
            let _in_flight = in_flight;
            job.await
        });
    }

    /// Number of sentences dispatched so far.
    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    /// Jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.jobs.len()
    }

    pub fn turn(&self) -> TurnId {
        self.ctx.turn
    }

    /// Signal that completes when the jobs dispatched so far have finished.
    pub fn idle_signal(&self) -> IdleSignal {
        IdleSignal(self.outstanding.subscribe())
    }

    /// Waits until every dispatched job has delivered its result.
    pub async fn wait_idle(&mut self) {
        while let Some(joined) = self.jobs.join_next().await {
            if let Err(e) = joined {
                tracing::error!("synthesis job did not complete: {}", e);
            }
        }
    }
}

impl Drop for SynthesisDispatcher {
    fn drop(&mut self) {
        self.jobs.detach_all();
    }
}

async fn run_job(ctx: JobContext, sentence: Sentence, target: PathBuf) {
    let _permit = match &ctx.limiter {
        Some(limiter) => limiter.clone().acquire_owned().await.ok(),
        None => None,
    };
    let sequence = sentence.sequence;

    // Separate task so a panicking backend counts as a failed job
    let synthesizer = ctx.synthesizer.clone();
    let job_target = target.clone();
    let outcome = tokio::spawn(async move {
        synthesizer
            .synthesize(&sentence.text, &job_target)
            .await
            .map_err(|e| e.to_string())
    })
    .await
    .unwrap_or_else(|e| Err(format!("synthesis task aborted: {}", e)));

    match outcome {
        Ok(()) => {
            ctx.buffer
                .submit(AudioArtifact::speech(ctx.turn, sequence, target));
        }
        Err(message) => {
            ctx.error_reporter
                .report(&PipelineIssue::Synthesis { sequence, message });
            substitute_silence(&ctx, sequence, target).await;
        }
    }
}

async fn substitute_silence(ctx: &JobContext, sequence: Sequence, target: PathBuf) {
    let silence = ctx.silence.clone();
    let placeholder = target.clone();
    let written = tokio::task::spawn_blocking(move || silence.write_silence(&placeholder))
        .await
        .map_err(|e| format!("placeholder task aborted: {}", e))
        .and_then(|result| result.map_err(|e| e.to_string()));

    match written {
        Ok(()) => {
            ctx.buffer
                .submit(AudioArtifact::silence(ctx.turn, sequence, target));
        }
        Err(message) => {
            ctx.error_reporter
                .report(&PipelineIssue::Placeholder { sequence, message });
            ctx.buffer.skip(ctx.turn, sequence);
        }
    }
}
