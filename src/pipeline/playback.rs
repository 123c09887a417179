//! Playback queue and the dedicated worker thread that drains it.
//!
//! The reorder buffer is the only producer; it pushes artifacts strictly in
//! sequence order. The worker plays them one at a time in FIFO order. The
//! queue is unbounded so a release never blocks while the buffer lock is held.

use crate::audio::player::ClipPlayer;
use crate::defaults;
use crate::pipeline::error::{ErrorReporter, LogReporter, PipelineIssue};
use crate::pipeline::types::AudioArtifact;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// FIFO of artifacts waiting to be played.
///
/// Cheap to clone; clones share the same channel.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    tx: Sender<AudioArtifact>,
    rx: Receiver<AudioArtifact>,
    /// Artifacts queued or currently being played.
    outstanding: Arc<AtomicUsize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Appends an artifact. Never blocks.
    pub fn push(&self, artifact: AudioArtifact) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        // Both ends live in self, so the channel cannot be disconnected
        if self.tx.send(artifact).is_err() {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Removes and returns every queued artifact.
    pub fn drain(&self) -> Vec<AudioArtifact> {
        let drained: Vec<AudioArtifact> = self.rx.try_iter().collect();
        self.outstanding.fetch_sub(drained.len(), Ordering::SeqCst);
        drained
    }

    /// Discards every queued artifact. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.drain().len()
    }

    /// Number of artifacts waiting to be played.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Artifacts queued plus the one currently playing, if any.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<AudioArtifact, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn finish_one(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// One running playback loop and its private stop flag.
struct ActiveLoop {
    keep_running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Plays queued artifacts on a dedicated thread.
pub struct PlaybackWorker {
    queue: PlaybackQueue,
    player: Arc<dyn ClipPlayer>,
    poll_interval: Duration,
    error_reporter: Arc<dyn ErrorReporter>,
    active: Mutex<Option<ActiveLoop>>,
    live_loops: Arc<AtomicUsize>,
    played: Arc<AtomicU64>,
}

impl PlaybackWorker {
    /// Creates a stopped worker draining `queue` into `player`.
    pub fn new(queue: PlaybackQueue, player: Arc<dyn ClipPlayer>) -> Self {
        Self {
            queue,
            player,
            poll_interval: Duration::from_millis(defaults::PLAYBACK_POLL_MS),
            error_reporter: Arc::new(LogReporter),
            active: Mutex::new(None),
            live_loops: Arc::new(AtomicUsize::new(0)),
            played: Arc::new(AtomicU64::new(0)),
        }
    }

    /// How long the loop waits for an artifact before re-checking its stop flag.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the playback loop. Returns false if it was already running, or
    /// if a loop detached by [`PlaybackWorker::stop`] is still finishing a clip.
    pub fn start(&self) -> bool {
        let mut active = self.lock_active();
        if active.is_some() {
            return false;
        }
        if self.live_loops() > 0 {
            tracing::warn!("previous playback thread still running, not restarting");
            return false;
        }

        let keep_running = Arc::new(AtomicBool::new(true));
        let ctx = LoopContext {
            queue: self.queue.clone(),
            player: self.player.clone(),
            poll_interval: self.poll_interval,
            error_reporter: self.error_reporter.clone(),
            keep_running: keep_running.clone(),
            live_loops: self.live_loops.clone(),
            played: self.played.clone(),
        };
        // Counted here so a stop() racing the thread spawn still sees it
        self.live_loops.fetch_add(1, Ordering::SeqCst);
        let thread = thread::spawn(move || ctx.run());

        tracing::debug!(player = self.player.name(), "playback worker started");
        *active = Some(ActiveLoop {
            keep_running,
            thread,
        });
        true
    }

    /// Stops the loop, aborting the clip being played. No-op when stopped.
    ///
    /// Waits up to two seconds for the thread to exit, then detaches it. A
    /// detached thread blocks restarts until it exits.
    pub fn stop(&self) {
        let Some(active) = self.lock_active().take() else {
            return;
        };
        active.keep_running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(2);
        let poll_interval = Duration::from_millis(10);
        while !active.thread.is_finished() {
            if Instant::now() >= deadline {
                tracing::warn!("playback thread did not stop in time, detaching");
                return;
            }
            thread::sleep(poll_interval);
        }

        if let Err(panic_info) = active.thread.join() {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            tracing::error!("playback thread panicked: {msg}");
        }
        tracing::debug!("playback worker stopped");
    }

    /// Appends an artifact directly to the queue.
    pub fn enqueue(&self, artifact: AudioArtifact) {
        self.queue.push(artifact);
    }

    /// Discards everything queued but not yet playing.
    pub fn clear(&self) -> usize {
        self.queue.clear()
    }

    pub fn is_running(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Number of playback loops alive right now. Never more than one.
    pub fn live_loops(&self) -> usize {
        self.live_loops.load(Ordering::SeqCst)
    }

    /// Clips played successfully since creation.
    pub fn played(&self) -> u64 {
        self.played.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// Blocks until nothing is queued or playing, or `timeout` elapses.
    /// Returns true when the queue drained.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.queue.outstanding() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveLoop>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PlaybackWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    queue: PlaybackQueue,
    player: Arc<dyn ClipPlayer>,
    poll_interval: Duration,
    error_reporter: Arc<dyn ErrorReporter>,
    keep_running: Arc<AtomicBool>,
    live_loops: Arc<AtomicUsize>,
    played: Arc<AtomicU64>,
}

impl LoopContext {
    fn run(self) {
        while self.keep_running.load(Ordering::SeqCst) {
            let artifact = match self.queue.recv_timeout(self.poll_interval) {
                Ok(artifact) => artifact,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            tracing::debug!(clip = %artifact.label(), kind = ?artifact.kind, "playing");
            match self.player.play(&artifact, &self.keep_running) {
                Ok(()) => {
                    self.played.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => self.error_reporter.report(&PipelineIssue::Playback {
                    sequence: artifact.sequence,
                    message: e.to_string(),
                }),
            }
            self.queue.finish_one();
        }
        self.live_loops.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::MockPlayer;
    use crate::pipeline::error::TurnLog;
    use crate::pipeline::types::TurnId;
    use std::path::PathBuf;

    fn artifact(sequence: u32) -> AudioArtifact {
        AudioArtifact::speech(
            TurnId(1),
            sequence,
            PathBuf::from(format!("/tmp/response_{:03}.wav", sequence)),
        )
    }

    fn fast_worker(queue: PlaybackQueue, player: MockPlayer) -> PlaybackWorker {
        PlaybackWorker::new(queue, Arc::new(player)).with_poll_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_queue_fifo_and_clear() {
        let queue = PlaybackQueue::new();
        queue.push(artifact(1));
        queue.push(artifact(2));
        queue.push(artifact(3));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.outstanding(), 3);

        let drained = queue.drain();
        let sequences: Vec<_> = drained.iter().map(|a| a.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert_eq!(queue.outstanding(), 0);

        queue.push(artifact(4));
        assert_eq!(queue.clear(), 1);
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_worker_plays_in_queue_order() {
        let queue = PlaybackQueue::new();
        let player = MockPlayer::new();
        let worker = fast_worker(queue.clone(), player.clone());

        for seq in 1..=4 {
            queue.push(artifact(seq));
        }
        assert!(worker.start());
        assert!(worker.wait_until_idle(Duration::from_secs(5)));

        assert_eq!(player.sequences(), vec![1, 2, 3, 4]);
        assert_eq!(worker.played(), 4);
        worker.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let worker = fast_worker(PlaybackQueue::new(), MockPlayer::new());

        assert!(worker.start());
        assert!(!worker.start());
        assert!(!worker.start());
        assert_eq!(worker.live_loops(), 1);
        assert!(worker.is_running());

        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(worker.live_loops(), 0);
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let queue = PlaybackQueue::new();
        let player = MockPlayer::new();
        let worker = fast_worker(queue.clone(), player.clone());

        worker.stop();
        worker.start();
        worker.stop();
        worker.stop();
        assert_eq!(worker.live_loops(), 0);

        queue.push(artifact(1));
        worker.start();
        assert!(worker.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(player.sequences(), vec![1]);
        assert_eq!(worker.live_loops(), 1);
    }

    /// Plays every clip to the end, ignoring stop requests.
    #[derive(Default)]
    struct UninterruptiblePlayer {
        playing: AtomicUsize,
        max_playing: AtomicUsize,
    }

    impl ClipPlayer for UninterruptiblePlayer {
        fn play(&self, _artifact: &AudioArtifact, _keep_playing: &AtomicBool) -> crate::Result<()> {
            let now = self.playing.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_playing.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2500));
            self.playing.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_no_restart_while_detached_loop_is_alive() {
        let queue = PlaybackQueue::new();
        let player = Arc::new(UninterruptiblePlayer::default());
        let worker = PlaybackWorker::new(queue.clone(), player.clone())
            .with_poll_interval(Duration::from_millis(10));

        queue.push(artifact(1));
        queue.push(artifact(2));
        worker.start();
        while player.playing.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        // Gives up waiting and detaches the thread mid-clip
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(worker.live_loops(), 1);
        assert!(!worker.start());
        assert_eq!(worker.live_loops(), 1);

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.live_loops() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.start());
        assert!(worker.wait_until_idle(Duration::from_secs(5)));
        assert_eq!(player.max_playing.load(Ordering::SeqCst), 1);
        worker.stop();
    }

    #[test]
    fn test_stop_aborts_current_clip() {
        let queue = PlaybackQueue::new();
        let player = MockPlayer::new().with_clip_duration(Duration::from_secs(30));
        let worker = fast_worker(queue.clone(), player.clone());

        queue.push(artifact(1));
        worker.start();
        while queue.len() > 0 {
            thread::sleep(Duration::from_millis(5));
        }

        let started = Instant::now();
        worker.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!player.played()[0].completed);
    }

    #[test]
    fn test_player_error_is_reported_and_loop_continues() {
        let queue = PlaybackQueue::new();
        let player = MockPlayer::new().with_failure_on(2);
        let log = TurnLog::new();
        let worker =
            fast_worker(queue.clone(), player.clone()).with_error_reporter(Arc::new(log.clone()));

        for seq in 1..=3 {
            queue.push(artifact(seq));
        }
        worker.start();
        assert!(worker.wait_until_idle(Duration::from_secs(5)));

        assert_eq!(player.sequences(), vec![1, 3]);
        assert_eq!(log.len(), 1);
        assert!(matches!(
            log.snapshot()[0],
            PipelineIssue::Playback { sequence: 2, .. }
        ));
    }

    #[test]
    fn test_clear_drops_pending_clips() {
        let queue = PlaybackQueue::new();
        let player = MockPlayer::new();
        let worker = fast_worker(queue.clone(), player.clone());

        worker.enqueue(artifact(1));
        worker.enqueue(artifact(2));
        assert_eq!(worker.clear(), 2);

        worker.start();
        assert!(worker.wait_until_idle(Duration::from_millis(200)));
        assert!(player.sequences().is_empty());
    }

    #[test]
    fn test_wait_until_idle_times_out() {
        let queue = PlaybackQueue::new();
        let worker = fast_worker(queue.clone(), MockPlayer::new());
        queue.push(artifact(1));

        // Not started, so nothing drains
        assert!(!worker.wait_until_idle(Duration::from_millis(30)));
    }
}
