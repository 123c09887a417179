//! Conversational turn orchestration: recognize → generate → synthesize → play.

use crate::audio::player::ClipPlayer;
use crate::audio::wav::write_pcm;
use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::error::{Result, VoxturnError};
use crate::llm::generator::{Generator, TextStream, parse_error_fragment};
use crate::pipeline::dispatcher::SynthesisDispatcher;
use crate::pipeline::error::{ActiveTurnReporter, ErrorReporter, PipelineIssue, TurnLog};
use crate::pipeline::events::{EventSink, TurnEvent};
use crate::pipeline::playback::{PlaybackQueue, PlaybackWorker};
use crate::pipeline::reorder::{ReorderBuffer, spawn_stall_watchdog};
use crate::pipeline::segmenter::{Segmenter, SplitPolicy};
use crate::pipeline::types::{Sequence, TurnId};
use crate::session::{SessionId, SessionStore, TurnDir};
use crate::stt::recognizer::Recognizer;
use crate::tts::silence::SilenceWriter;
use crate::tts::synthesizer::Synthesizer;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the turn pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sentence delimiters in priority order
    pub delimiters: Vec<String>,
    pub split_policy: SplitPolicy,
    /// Cap on concurrent synthesis jobs; `None` is unbounded
    pub max_concurrent_jobs: Option<usize>,
    /// Skip a missing slot after later clips waited this long; `None` waits forever
    pub stall_timeout: Option<Duration>,
    /// Playback worker's bounded wait between stop-flag checks
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delimiters: defaults::SENTENCE_DELIMITERS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            split_policy: SplitPolicy::default(),
            max_concurrent_jobs: None,
            stall_timeout: Some(Duration::from_millis(defaults::STALL_TIMEOUT_MS)),
            poll_interval: Duration::from_millis(defaults::PLAYBACK_POLL_MS),
        }
    }
}

/// The capability backends, resolved once at startup.
#[derive(Clone)]
pub struct Backends {
    pub recognizer: Arc<dyn Recognizer>,
    pub generator: Arc<dyn Generator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub silence: Arc<dyn SilenceWriter>,
}

/// What one turn produced. Issues keep accumulating in `log` while the
/// turn's synthesis jobs and playback finish.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub turn: TurnId,
    pub session: SessionId,
    /// `None` when the reply was spoken from given text.
    pub transcript: Option<String>,
    pub reply: String,
    /// Sentences dispatched for synthesis.
    pub sentences: u32,
    pub log: TurnLog,
}

impl TurnSummary {
    /// Serializable snapshot of the summary.
    pub fn report(&self) -> TurnReport {
        TurnReport {
            turn: self.turn,
            session: self.session.clone(),
            transcript: self.transcript.clone(),
            reply: self.reply.clone(),
            sentences: self.sentences,
            issues: self.log.snapshot(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub turn: TurnId,
    pub session: SessionId,
    pub transcript: Option<String>,
    pub reply: String,
    pub sentences: u32,
    pub issues: Vec<PipelineIssue>,
}

/// Point-in-time view of the playback side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub turn: TurnId,
    pub playing: bool,
    pub queued: usize,
    pub next_expected: Sequence,
    pub buffered: usize,
    pub stalled: Option<Sequence>,
}

/// Owns every long-lived component of the assistant.
pub struct Assistant {
    config: PipelineConfig,
    backends: Backends,
    sessions: SessionStore,
    buffer: Arc<ReorderBuffer>,
    playback: PlaybackWorker,
    reporter: Arc<ActiveTurnReporter>,
    /// Dispatcher of the latest turn. Only held briefly, never across an await
    /// on synthesis.
    active: tokio::sync::Mutex<Option<SynthesisDispatcher>>,
    /// Serializes turns; a new turn waits for the previous generation to end.
    turn_lock: tokio::sync::Mutex<()>,
    watchdog: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Assistant {
    pub fn new(
        config: PipelineConfig,
        backends: Backends,
        sessions: SessionStore,
        player: Arc<dyn ClipPlayer>,
    ) -> Self {
        Self::with_clock(config, backends, sessions, player, Arc::new(SystemClock))
    }

    /// Like [`Assistant::new`] with an explicit time source for stall detection.
    pub fn with_clock(
        config: PipelineConfig,
        backends: Backends,
        sessions: SessionStore,
        player: Arc<dyn ClipPlayer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let reporter = Arc::new(ActiveTurnReporter::new());
        let queue = PlaybackQueue::new();
        let buffer = Arc::new(
            ReorderBuffer::new(queue.clone())
                .with_clock(clock)
                .with_stall_timeout(config.stall_timeout)
                .with_error_reporter(reporter.clone()),
        );
        let playback = PlaybackWorker::new(queue, player)
            .with_poll_interval(config.poll_interval)
            .with_error_reporter(reporter.clone());

        Self {
            config,
            backends,
            sessions,
            buffer,
            playback,
            reporter,
            active: tokio::sync::Mutex::new(None),
            turn_lock: tokio::sync::Mutex::new(()),
            watchdog: std::sync::Mutex::new(None),
        }
    }

    /// Starts playback and, when a stall timeout is set, the stall watchdog.
    /// Idempotent.
    pub fn start(&self) {
        self.playback.start();

        let Some(timeout) = self.config.stall_timeout else {
            return;
        };
        let mut watchdog = self.watchdog.lock().unwrap_or_else(|e| e.into_inner());
        if watchdog.is_some() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(_) => {
                let period = (timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(1));
                *watchdog = Some(spawn_stall_watchdog(self.buffer.clone(), period));
            }
            Err(_) => tracing::warn!("no async runtime, stall watchdog disabled"),
        }
    }

    /// Stops playback (aborting the current clip) and the watchdog. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self
            .watchdog
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.playback.stop();
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn buffer(&self) -> &Arc<ReorderBuffer> {
        &self.buffer
    }

    pub fn playback(&self) -> &PlaybackWorker {
        &self.playback
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            turn: self.buffer.current_turn(),
            playing: self.playback.is_running(),
            queued: self.playback.queue().outstanding(),
            next_expected: self.buffer.next_expected(),
            buffered: self.buffer.pending_len(),
            stalled: self.buffer.stalled_sequence().map(|(seq, _)| seq),
        }
    }

    /// Runs one turn from recorded speech (16kHz mono).
    ///
    /// Returns once generation has finished and every sentence has been
    /// dispatched; synthesis and playback continue in the background.
    pub async fn run_turn(
        &self,
        session: &SessionId,
        audio: Vec<i16>,
        events: &dyn EventSink,
    ) -> Result<TurnSummary> {
        let _turn = self.turn_lock.lock().await;
        let (turn, log, turn_dir) = match self.begin_turn(session).await {
            Ok(started) => started,
            Err(e) => {
                events.emit(TurnEvent::error(e.to_string()));
                return Err(e);
            }
        };

        events.emit(TurnEvent::status("Recognizing speech..."));
        let transcript = match self.recognize(session, audio).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%turn, "turn aborted: {}", e);
                events.emit(TurnEvent::error(e.to_string()));
                return Err(e);
            }
        };
        tracing::info!(%turn, transcript = %transcript, "speech recognized");
        events.emit(TurnEvent::PartialTranscript {
            text: transcript.clone(),
        });

        events.emit(TurnEvent::status("Generating reply..."));
        let stream = self.backends.generator.generate(&transcript);
        let (reply, sentences) = self.respond(turn, &log, turn_dir, stream, events).await;

        Ok(TurnSummary {
            turn,
            session: session.clone(),
            transcript: Some(transcript),
            reply,
            sentences,
            log,
        })
    }

    /// Speaks `text` as a turn of its own, skipping recognition and generation.
    pub async fn speak(
        &self,
        session: &SessionId,
        text: &str,
        events: &dyn EventSink,
    ) -> Result<TurnSummary> {
        let _turn = self.turn_lock.lock().await;
        let (turn, log, turn_dir) = match self.begin_turn(session).await {
            Ok(started) => started,
            Err(e) => {
                events.emit(TurnEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let stream: TextStream = futures_util::stream::iter([text.to_string()]).boxed();
        let (reply, sentences) = self.respond(turn, &log, turn_dir, stream, events).await;

        Ok(TurnSummary {
            turn,
            session: session.clone(),
            transcript: None,
            reply,
            sentences,
            log,
        })
    }

    /// Interrupts playback: drops queued and buffered clips and starts a new
    /// (empty) turn. In-flight synthesis results become stale.
    pub async fn interrupt(&self) -> TurnId {
        let mut active = self.active.lock().await;
        active.take();
        let turn = self.buffer.reset();
        tracing::info!(%turn, "playback interrupted");
        turn
    }

    /// Waits until every sentence of the latest turn has been synthesized
    /// (or replaced by a placeholder) and handed to the reorder buffer.
    ///
    /// Does not hold up [`Assistant::interrupt`] or a new turn while waiting.
    pub async fn wait_for_synthesis(&self) {
        let idle = self.active.lock().await.as_ref().map(|d| d.idle_signal());
        if let Some(idle) = idle {
            idle.wait().await;
        }
    }

    /// Waits until the latest turn has been synthesized and fully played.
    /// Returns false if `timeout` elapsed first.
    pub async fn wait_for_playback(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if tokio::time::timeout(timeout, self.wait_for_synthesis())
            .await
            .is_err()
        {
            return false;
        }

        loop {
            if self.playback.queue().outstanding() == 0 && self.buffer.pending_len() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn begin_turn(&self, session: &SessionId) -> Result<(TurnId, TurnLog, TurnDir)> {
        let mut active = self.active.lock().await;
        // Dropping the previous dispatcher detaches its jobs
        active.take();

        let turn = self.buffer.reset();
        let log = TurnLog::new();
        self.reporter.begin(log.clone());
        let turn_dir = self.sessions.turn_dir(session, turn)?;

        tracing::debug!(%turn, %session, "turn started");
        Ok((turn, log, turn_dir))
    }

    async fn recognize(&self, session: &SessionId, audio: Vec<i16>) -> Result<String> {
        let recognizer = self.backends.recognizer.clone();
        if !recognizer.is_ready() {
            return Err(VoxturnError::Recognition {
                message: format!("recognizer '{}' is not ready", recognizer.model_name()),
            });
        }

        let input_path = self.sessions.input_path(session)?;
        let text = tokio::task::spawn_blocking(move || {
            if let Err(e) = write_pcm(&input_path, &audio, defaults::INPUT_SAMPLE_RATE) {
                tracing::warn!("failed to keep {}: {}", input_path.display(), e);
            }
            recognizer.transcribe(&audio)
        })
        .await
        .map_err(|e| VoxturnError::Recognition {
            message: format!("recognizer task failed: {}", e),
        })??;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(VoxturnError::EmptyTranscript);
        }
        Ok(text)
    }

    /// Streams generated text through the segmenter into synthesis.
    async fn respond(
        &self,
        turn: TurnId,
        log: &TurnLog,
        turn_dir: TurnDir,
        mut stream: TextStream,
        events: &dyn EventSink,
    ) -> (String, u32) {
        let mut segmenter = Segmenter::new(self.config.delimiters.iter().cloned())
            .with_policy(self.config.split_policy);
        let mut dispatcher = SynthesisDispatcher::new(
            turn,
            turn_dir,
            self.backends.synthesizer.clone(),
            self.backends.silence.clone(),
            self.buffer.clone(),
            Arc::new(log.clone()),
        )
        .with_max_concurrent(self.config.max_concurrent_jobs);

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            if let Some(message) = parse_error_fragment(&fragment) {
                log.report(&PipelineIssue::Generation {
                    message: message.to_string(),
                });
            }
            reply.push_str(&fragment);
            events.emit(TurnEvent::TextChunk {
                text: fragment.clone(),
            });

            for sentence in segmenter.feed(&fragment) {
                dispatcher.on_sentence_complete(sentence);
            }
            // Let dispatched jobs start before the next fragment is awaited
            tokio::task::yield_now().await;
        }
        if let Some(sentence) = segmenter.flush() {
            dispatcher.on_sentence_complete(sentence);
        }

        let sentences = dispatcher.dispatched();
        tracing::info!(%turn, sentences, "generation complete");
        events.emit(TurnEvent::GenerationComplete {
            text: reply.clone(),
        });

        *self.active.lock().await = Some(dispatcher);
        (reply, sentences)
    }
}

impl Drop for Assistant {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::MockPlayer;
    use crate::clock::MockClock;
    use crate::llm::generator::ScriptedGenerator;
    use crate::pipeline::events::CollectingSink;
    use crate::pipeline::types::ArtifactKind;
    use crate::stt::recognizer::MockRecognizer;
    use crate::tts::silence::WavSilence;
    use crate::tts::synthesizer::MockSynthesizer;

    struct Harness {
        _dir: tempfile::TempDir,
        assistant: Assistant,
        player: MockPlayer,
        session: SessionId,
    }

    fn harness(
        recognizer: MockRecognizer,
        generator: ScriptedGenerator,
        synthesizer: MockSynthesizer,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::open(dir.path()).unwrap();
        let session = sessions.create_session().unwrap();
        let player = MockPlayer::new();
        let config = PipelineConfig {
            delimiters: vec![".".to_string(), "?".to_string(), "!".to_string()],
            poll_interval: Duration::from_millis(10),
            ..PipelineConfig::default()
        };
        let backends = Backends {
            recognizer: Arc::new(recognizer),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            silence: Arc::new(WavSilence::default()),
        };
        let assistant = Assistant::new(config, backends, sessions, Arc::new(player.clone()));
        Harness {
            _dir: dir,
            assistant,
            player,
            session,
        }
    }

    #[tokio::test]
    async fn test_turn_event_sequence() {
        let h = harness(
            MockRecognizer::new("mock").with_response("What's up?"),
            ScriptedGenerator::new(["Not much. ", "You?"]),
            MockSynthesizer::new(),
        );
        let sink = CollectingSink::new();

        let summary = h
            .assistant
            .run_turn(&h.session, vec![0; 1600], &sink)
            .await
            .unwrap();

        assert_eq!(
            sink.events(),
            vec![
                TurnEvent::status("Recognizing speech..."),
                TurnEvent::PartialTranscript {
                    text: "What's up?".to_string()
                },
                TurnEvent::status("Generating reply..."),
                TurnEvent::TextChunk {
                    text: "Not much. ".to_string()
                },
                TurnEvent::TextChunk {
                    text: "You?".to_string()
                },
                TurnEvent::GenerationComplete {
                    text: "Not much. You?".to_string()
                },
            ]
        );
        assert_eq!(summary.transcript.as_deref(), Some("What's up?"));
        assert_eq!(summary.sentences, 2);
    }

    #[tokio::test]
    async fn test_playback_follows_sentence_order() {
        let synth = MockSynthesizer::new()
            .with_delay_for("First.", Duration::from_millis(150))
            .with_delay_for("Second.", Duration::from_millis(30))
            .with_delay_for("Third.", Duration::from_millis(5));
        let h = harness(
            MockRecognizer::new("mock").with_response("go"),
            ScriptedGenerator::new(["First. Second. ", "Third."]),
            synth,
        );
        h.assistant.start();

        h.assistant
            .run_turn(&h.session, vec![0; 160], &CollectingSink::new())
            .await
            .unwrap();
        assert!(h.assistant.wait_for_playback(Duration::from_secs(5)).await);

        assert_eq!(h.player.sequences(), vec![1, 2, 3]);
        h.assistant.stop();
    }

    #[tokio::test]
    async fn test_failed_recognition_aborts_turn() {
        let synth = MockSynthesizer::new();
        let h = harness(
            MockRecognizer::new("mock").with_failure(),
            ScriptedGenerator::new(["unused."]),
            synth.clone(),
        );
        let sink = CollectingSink::new();

        let result = h.assistant.run_turn(&h.session, vec![0; 160], &sink).await;

        assert!(result.is_err());
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], TurnEvent::Error { .. }));
        assert!(synth.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_transcript_aborts_turn() {
        let h = harness(
            MockRecognizer::new("mock").with_response("   "),
            ScriptedGenerator::new(["unused."]),
            MockSynthesizer::new(),
        );
        let sink = CollectingSink::new();

        let result = h.assistant.run_turn(&h.session, vec![0; 160], &sink).await;

        assert!(matches!(result, Err(VoxturnError::EmptyTranscript)));
        assert_eq!(
            sink.events().last(),
            Some(&TurnEvent::error("Speech recognition returned no text"))
        );
    }

    #[tokio::test]
    async fn test_generation_failure_is_spoken_and_logged() {
        let h = harness(
            MockRecognizer::new("mock").with_response("hi"),
            ScriptedGenerator::new(["Sure. "]).with_failure("timeout"),
            MockSynthesizer::new(),
        );

        let summary = h
            .assistant
            .run_turn(&h.session, vec![0; 160], &CollectingSink::new())
            .await
            .unwrap();

        assert_eq!(summary.reply, "Sure. [error: timeout]");
        assert_eq!(summary.sentences, 2);
        assert_eq!(
            summary.log.snapshot(),
            vec![PipelineIssue::Generation {
                message: "timeout".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_synthesis_failure_plays_silence() {
        let h = harness(
            MockRecognizer::new("mock").with_response("hi"),
            ScriptedGenerator::new(["One. Two. Three."]),
            MockSynthesizer::new().with_failure_for("Two."),
        );
        h.assistant.start();

        let summary = h
            .assistant
            .run_turn(&h.session, vec![0; 160], &CollectingSink::new())
            .await
            .unwrap();
        assert!(h.assistant.wait_for_playback(Duration::from_secs(5)).await);

        let kinds: Vec<_> = h.player.played().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ArtifactKind::Speech, ArtifactKind::Silence, ArtifactKind::Speech]
        );
        assert!(summary.report().issues.iter().any(|i| i.is_audible()));
    }

    #[tokio::test]
    async fn test_new_turn_discards_previous_turn_audio() {
        let synth = MockSynthesizer::new().with_delay_for("Slow.", Duration::from_millis(200));
        let h = harness(
            MockRecognizer::new("mock").with_response("hi"),
            ScriptedGenerator::new(["Slow."]),
            synth,
        );
        h.assistant.start();

        let first = h
            .assistant
            .speak(&h.session, "Slow.", &CollectingSink::new())
            .await
            .unwrap();
        let second = h
            .assistant
            .speak(&h.session, "Quick.", &CollectingSink::new())
            .await
            .unwrap();
        assert_ne!(first.turn, second.turn);

        assert!(h.assistant.wait_for_playback(Duration::from_secs(5)).await);
        // Let the detached first-turn job finish and be discarded
        tokio::time::sleep(Duration::from_millis(300)).await;

        let played = h.player.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].turn, second.turn);
        assert!(
            second
                .log
                .snapshot()
                .contains(&PipelineIssue::Stale { sequence: 1 })
        );
    }

    #[tokio::test]
    async fn test_speak_splits_given_text() {
        let synth = MockSynthesizer::new();
        let h = harness(
            MockRecognizer::new("mock"),
            ScriptedGenerator::new(Vec::<String>::new()),
            synth.clone(),
        );

        let summary = h
            .assistant
            .speak(&h.session, "Hello there. How are you. Fine", &CollectingSink::new())
            .await
            .unwrap();
        h.assistant.wait_for_synthesis().await;

        assert_eq!(summary.sentences, 3);
        assert!(summary.transcript.is_none());
        let mut calls = synth.calls();
        calls.sort();
        assert_eq!(calls, vec!["Fine", "Hello there.", "How are you."]);
    }

    #[tokio::test]
    async fn test_stalled_slot_is_skipped_by_watchdog() {
        let clock = MockClock::new();
        let dir = tempfile::tempdir().unwrap();
        let sessions = SessionStore::open(dir.path()).unwrap();
        let session = sessions.create_session().unwrap();
        let player = MockPlayer::new();
        let config = PipelineConfig {
            delimiters: vec![".".to_string()],
            stall_timeout: Some(Duration::from_millis(40)),
            poll_interval: Duration::from_millis(10),
            ..PipelineConfig::default()
        };
        let backends = Backends {
            recognizer: Arc::new(MockRecognizer::new("mock")),
            generator: Arc::new(ScriptedGenerator::new(Vec::<String>::new())),
            synthesizer: Arc::new(
                MockSynthesizer::new().with_delay_for("Stuck.", Duration::from_secs(60)),
            ),
            silence: Arc::new(WavSilence::default()),
        };
        let assistant = Assistant::with_clock(
            config,
            backends,
            sessions,
            Arc::new(player.clone()),
            Arc::new(clock.clone()),
        );
        assistant.start();

        let summary = assistant
            .speak(&session, "Stuck. Free.", &CollectingSink::new())
            .await
            .unwrap();

        // Wait for "Free." to be buffered behind the stuck slot
        let deadline = Instant::now() + Duration::from_secs(5);
        while assistant.buffer().pending_len() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(assistant.status().stalled, Some(1));

        clock.advance(Duration::from_millis(50));
        let deadline = Instant::now() + Duration::from_secs(5);
        while player.sequences().is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(player.sequences(), vec![2]);
        assert!(summary
            .log
            .snapshot()
            .iter()
            .any(|i| matches!(i, PipelineIssue::Stalled { sequence: 1, .. })));
        assistant.stop();
    }

    #[tokio::test]
    async fn test_status_reports_idle_pipeline() {
        let h = harness(
            MockRecognizer::new("mock"),
            ScriptedGenerator::new(Vec::<String>::new()),
            MockSynthesizer::new(),
        );
        let status = h.assistant.status();
        assert!(!status.playing);
        assert_eq!(status.queued, 0);
        assert_eq!(status.stalled, None);

        h.assistant.start();
        h.assistant.start();
        assert!(h.assistant.status().playing);
        assert_eq!(h.assistant.playback().live_loops(), 1);
        h.assistant.stop();
        assert!(!h.assistant.status().playing);
    }

    #[tokio::test]
    async fn test_interrupt_starts_new_turn() {
        let h = harness(
            MockRecognizer::new("mock"),
            ScriptedGenerator::new(Vec::<String>::new()),
            MockSynthesizer::new().with_default_delay(Duration::from_millis(50)),
        );
        let summary = h
            .assistant
            .speak(&h.session, "One. Two.", &CollectingSink::new())
            .await
            .unwrap();

        let turn = h.assistant.interrupt().await;
        assert_eq!(turn, summary.turn.next());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(h.assistant.playback().queue().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_is_not_held_up_by_waiting_caller() {
        let h = harness(
            MockRecognizer::new("mock"),
            ScriptedGenerator::new(Vec::<String>::new()),
            MockSynthesizer::new().with_default_delay(Duration::from_secs(5)),
        );
        let assistant = Arc::new(h.assistant);
        let summary = assistant
            .speak(&h.session, "Long sentence.", &CollectingSink::new())
            .await
            .unwrap();

        let waiter = {
            let assistant = assistant.clone();
            tokio::spawn(async move { assistant.wait_for_playback(Duration::from_secs(30)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let turn = tokio::time::timeout(Duration::from_secs(1), assistant.interrupt())
            .await
            .unwrap();
        assert_eq!(turn, summary.turn.next());

        // A new turn is not held up either
        let next = tokio::time::timeout(
            Duration::from_secs(1),
            assistant.speak(&h.session, "Short.", &CollectingSink::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(next.turn, turn.next());
        waiter.abort();
    }
}
