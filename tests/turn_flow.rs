//! Whole turns through the assistant with in-process backends.

use std::sync::Arc;
use std::time::Duration;
use voxturn::audio::player::MockPlayer;
use voxturn::llm::generator::ScriptedGenerator;
use voxturn::pipeline::error::PipelineIssue;
use voxturn::pipeline::events::{CollectingSink, TurnEvent};
use voxturn::pipeline::orchestrator::{Assistant, Backends, PipelineConfig};
use voxturn::pipeline::segmenter::SplitPolicy;
use voxturn::session::SessionStore;
use voxturn::stt::recognizer::MockRecognizer;
use voxturn::tts::silence::WavSilence;
use voxturn::tts::synthesizer::MockSynthesizer;
use voxturn::tts::tone::ToneSynthesizer;
use voxturn::{Synthesizer, VoxturnError};

fn assistant(
    dir: &std::path::Path,
    generator: ScriptedGenerator,
    synthesizer: Arc<dyn Synthesizer>,
    player: &MockPlayer,
) -> Assistant {
    let config = PipelineConfig {
        split_policy: SplitPolicy::Earliest,
        poll_interval: Duration::from_millis(10),
        ..PipelineConfig::default()
    };
    let backends = Backends {
        recognizer: Arc::new(MockRecognizer::new("mock").with_response("Tell me a story")),
        generator: Arc::new(generator),
        synthesizer,
        silence: Arc::new(WavSilence::default()),
    };
    Assistant::new(
        config,
        backends,
        SessionStore::open(dir).unwrap(),
        Arc::new(player.clone()),
    )
}

#[tokio::test]
async fn streamed_reply_is_spoken_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let player = MockPlayer::new();
    let generator = ScriptedGenerator::new([
        "Once upon a time, ",
        "there was a fox. It ",
        "ran fast! ",
        "The end",
    ])
    .with_delay(Duration::from_millis(5));
    // Earlier sentences take longer, so they finish last
    let synthesizer = MockSynthesizer::new()
        .with_delay_for("Once upon a time, there was a fox.", Duration::from_millis(120))
        .with_delay_for("It ran fast!", Duration::from_millis(60));
    let assistant = assistant(dir.path(), generator, Arc::new(synthesizer), &player);
    assistant.start();

    let session = assistant.sessions().create_session().unwrap();
    let sink = CollectingSink::new();
    let summary = assistant
        .run_turn(&session, vec![0; 16000], &sink)
        .await
        .unwrap();
    assert!(assistant.wait_for_playback(Duration::from_secs(5)).await);

    assert_eq!(summary.sentences, 3);
    assert_eq!(
        summary.reply,
        "Once upon a time, there was a fox. It ran fast! The end"
    );
    assert_eq!(player.sequences(), vec![1, 2, 3]);

    let chunks: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            TurnEvent::TextChunk { text } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(chunks.len(), 4);
    assert!(summary.log.is_empty());
    assistant.stop();
}

#[tokio::test]
async fn turns_of_one_session_get_separate_clip_directories() {
    let dir = tempfile::tempdir().unwrap();
    let player = MockPlayer::new();
    let assistant = assistant(
        dir.path(),
        ScriptedGenerator::new(["Short answer."]),
        Arc::new(ToneSynthesizer::new(8000)),
        &player,
    );
    assistant.start();
    let session = assistant.sessions().create_session().unwrap();

    let first = assistant
        .run_turn(&session, vec![0; 1600], &CollectingSink::new())
        .await
        .unwrap();
    assert!(assistant.wait_for_playback(Duration::from_secs(5)).await);
    let second = assistant
        .speak(&session, "Another one.", &CollectingSink::new())
        .await
        .unwrap();
    assert!(assistant.wait_for_playback(Duration::from_secs(5)).await);

    let session_dir = dir.path().join(session.as_str());
    for turn in [first.turn, second.turn] {
        let clip = session_dir
            .join(format!("turn-{:04}", turn.0))
            .join("response_001.wav");
        assert!(clip.is_file(), "missing {}", clip.display());
    }
    assert!(session_dir.join("user_input.wav").is_file());
    assert_eq!(player.played().len(), 2);
    assistant.stop();
}

#[tokio::test]
async fn generator_failure_is_spoken_inline() {
    let dir = tempfile::tempdir().unwrap();
    let player = MockPlayer::new();
    let synthesizer = MockSynthesizer::new();
    let assistant = assistant(
        dir.path(),
        ScriptedGenerator::new(["Let me check. "]).with_failure("connection reset"),
        Arc::new(synthesizer.clone()),
        &player,
    );

    let session = assistant.sessions().create_session().unwrap();
    let sink = CollectingSink::new();
    let summary = assistant
        .run_turn(&session, vec![0; 1600], &sink)
        .await
        .unwrap();
    assistant.wait_for_synthesis().await;

    assert_eq!(
        sink.events().last(),
        Some(&TurnEvent::GenerationComplete {
            text: "Let me check. [error: connection reset]".to_string()
        })
    );
    let mut calls = synthesizer.calls();
    calls.sort();
    assert_eq!(calls, vec!["Let me check.", "[error: connection reset]"]);
    assert_eq!(
        summary.log.snapshot(),
        vec![PipelineIssue::Generation {
            message: "connection reset".to_string()
        }]
    );
}

#[tokio::test]
async fn failed_recognition_produces_no_audio() {
    let dir = tempfile::tempdir().unwrap();
    let player = MockPlayer::new();
    let synthesizer = MockSynthesizer::new();
    let backends = Backends {
        recognizer: Arc::new(MockRecognizer::new("mock").with_failure()),
        generator: Arc::new(ScriptedGenerator::new(["Never said."])),
        synthesizer: Arc::new(synthesizer.clone()),
        silence: Arc::new(WavSilence::default()),
    };
    let assistant = Assistant::new(
        PipelineConfig::default(),
        backends,
        SessionStore::open(dir.path()).unwrap(),
        Arc::new(player.clone()),
    );
    assistant.start();

    let session = assistant.sessions().create_session().unwrap();
    let sink = CollectingSink::new();
    let result = assistant.run_turn(&session, vec![0; 1600], &sink).await;

    assert!(matches!(result, Err(VoxturnError::Recognition { .. })));
    assert!(matches!(sink.events().last(), Some(TurnEvent::Error { .. })));
    assert!(synthesizer.calls().is_empty());
    assert!(player.played().is_empty());
    assistant.stop();
}
