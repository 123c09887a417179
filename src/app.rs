//! Application entry points.
//!
//! Builds the backends named in the configuration, wires them into an
//! [`Assistant`], and runs the `run`, `say` and `serve` commands.

use crate::audio::player::{ClipPlayer, NullPlayer};
use crate::audio::wav::load_input_file;
use crate::config::{
    Config, GeneratorConfig, PlaybackBackend, RecognizerConfig, SynthesizerConfig,
};
use crate::error::{Result, VoxturnError};
use crate::ipc::protocol::{Request, Response};
use crate::ipc::server::{IpcServer, RequestHandler};
use crate::llm::generator::{Generator, ScriptedGenerator};
use crate::pipeline::events::{EventSink, TurnEvent};
use crate::pipeline::orchestrator::{Assistant, Backends, TurnSummary};
use crate::session::{SessionId, SessionStore};
use crate::stt::command::CommandRecognizer;
use crate::stt::recognizer::{MockRecognizer, Recognizer};
use crate::tts::command::CommandSynthesizer;
use crate::tts::silence::WavSilence;
use crate::tts::synthesizer::Synthesizer;
use crate::tts::tone::ToneSynthesizer;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Build the recognizer named by `[recognizer]`.
pub fn build_recognizer(config: &RecognizerConfig) -> Arc<dyn Recognizer> {
    match config {
        RecognizerConfig::Mock { response } => {
            Arc::new(MockRecognizer::new("mock").with_response(response))
        }
        RecognizerConfig::Command { program, args } => {
            Arc::new(CommandRecognizer::new(program.clone(), args.clone()))
        }
    }
}

/// Build the generator named by `[generator]`.
pub fn build_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>> {
    match config {
        GeneratorConfig::Scripted {
            fragments,
            delay_ms,
        } => {
            let mut generator = ScriptedGenerator::new(fragments.iter().cloned());
            if *delay_ms > 0 {
                generator = generator.with_delay(Duration::from_millis(*delay_ms));
            }
            Ok(Arc::new(generator))
        }
        #[cfg(feature = "llm")]
        GeneratorConfig::OpenAi {
            base_url,
            model,
            api_key,
            temperature,
            max_tokens,
            system_prompt,
        } => {
            use crate::llm::openai::{OpenAiGenerator, OpenAiSettings};

            if api_key.is_none() {
                tracing::warn!("no API key configured, sending unauthenticated requests");
            }
            Ok(Arc::new(OpenAiGenerator::new(OpenAiSettings {
                base_url: base_url.clone(),
                api_key: api_key.clone(),
                model: model.clone(),
                temperature: *temperature,
                max_tokens: *max_tokens,
                system_prompt: system_prompt.clone(),
            })))
        }
        #[cfg(not(feature = "llm"))]
        GeneratorConfig::OpenAi { .. } => Err(VoxturnError::ConfigInvalidValue {
            key: "generator.backend".to_string(),
            message: "openai requires building with the `llm` feature".to_string(),
        }),
    }
}

/// Build the synthesizer named by `[synthesizer]`.
pub fn build_synthesizer(config: &SynthesizerConfig) -> Arc<dyn Synthesizer> {
    match config {
        SynthesizerConfig::Command {
            program,
            args,
            voice,
            timeout_ms,
        } => {
            let mut synthesizer = CommandSynthesizer::new(program.clone(), args.clone())
                .with_timeout(timeout_ms.map(Duration::from_millis));
            if let Some(voice) = voice {
                synthesizer = synthesizer.with_voice(voice.clone());
            }
            Arc::new(synthesizer)
        }
        SynthesizerConfig::Tone { sample_rate } => Arc::new(ToneSynthesizer::new(*sample_rate)),
    }
}

/// Build the output player. `no_playback` forces the null player.
pub fn build_player(config: &Config, no_playback: bool) -> Result<Arc<dyn ClipPlayer>> {
    if no_playback {
        return Ok(Arc::new(NullPlayer));
    }
    match config.playback.backend {
        PlaybackBackend::Null => Ok(Arc::new(NullPlayer)),
        #[cfg(feature = "cpal-audio")]
        PlaybackBackend::Cpal => Ok(Arc::new(crate::audio::output::CpalPlayer::new(
            config.playback.device.as_deref(),
        )?)),
        #[cfg(not(feature = "cpal-audio"))]
        PlaybackBackend::Cpal => Err(VoxturnError::ConfigInvalidValue {
            key: "playback.backend".to_string(),
            message: "cpal requires building with the `cpal-audio` feature".to_string(),
        }),
    }
}

/// Validate `config` and assemble a started assistant.
pub fn build_assistant(config: &Config, no_playback: bool) -> Result<Assistant> {
    config.validate()?;

    let backends = Backends {
        recognizer: build_recognizer(&config.recognizer),
        generator: build_generator(&config.generator)?,
        synthesizer: build_synthesizer(&config.synthesizer),
        silence: Arc::new(WavSilence::new(
            config.playback.sample_rate,
            config.pipeline.placeholder_secs,
        )),
    };
    let sessions = SessionStore::open(&config.output.dir)?;
    let player = build_player(config, no_playback)?;
    tracing::debug!(
        recognizer = backends.recognizer.model_name(),
        generator = backends.generator.model_name(),
        synthesizer = backends.synthesizer.name(),
        player = player.name(),
        "backends ready"
    );

    let assistant = Assistant::new(config.pipeline_config(), backends, sessions, player);
    assistant.start();
    Ok(assistant)
}

/// Prints turn progress: the reply to stdout, everything else to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: TurnEvent) {
        match event {
            TurnEvent::Status { message } => {
                if !self.quiet {
                    eprintln!("{}", message);
                }
            }
            TurnEvent::PartialTranscript { text } => {
                if !self.quiet {
                    eprintln!("You: {}", text);
                }
            }
            TurnEvent::TextChunk { text } => {
                let mut stdout = std::io::stdout().lock();
                if write!(stdout, "{}", text)
                    .and_then(|_| stdout.flush())
                    .is_err()
                {
                    tracing::trace!("stdout closed");
                }
            }
            TurnEvent::GenerationComplete { .. } => println!(),
            TurnEvent::Error { message } => eprintln!("Error: {}", message),
        }
    }
}

fn resolve_session(sessions: &SessionStore, session: Option<&str>) -> Result<SessionId> {
    match session {
        Some(id) => SessionId::parse(id),
        None => sessions.create_session(),
    }
}

async fn finish(assistant: &Assistant, summary: &TurnSummary, wait: Duration, quiet: bool) {
    if !assistant.wait_for_playback(wait).await {
        tracing::warn!(turn = %summary.turn, "playback still running after {:?}", wait);
    }
    assistant.stop();

    let issues = summary.log.snapshot();
    if !quiet && !issues.is_empty() {
        eprintln!("{} issue(s) during this turn:", issues.len());
        for issue in issues {
            eprintln!("  {}", issue);
        }
    }
}

/// Run the `run` command: one turn from a WAV file.
pub async fn run_turn_command(
    config: Config,
    audio: &Path,
    session: Option<&str>,
    quiet: bool,
    no_playback: bool,
    wait: Duration,
) -> Result<()> {
    let samples = load_input_file(audio)?;
    let assistant = build_assistant(&config, no_playback)?;
    let session = resolve_session(assistant.sessions(), session)?;

    let summary = assistant
        .run_turn(&session, samples, &ConsoleSink::new(quiet))
        .await?;
    finish(&assistant, &summary, wait, quiet).await;
    Ok(())
}

/// Run the `say` command: speak text without recognition or generation.
pub async fn run_say_command(
    config: Config,
    text: &str,
    session: Option<&str>,
    quiet: bool,
    no_playback: bool,
    wait: Duration,
) -> Result<()> {
    let assistant = build_assistant(&config, no_playback)?;
    let session = resolve_session(assistant.sessions(), session)?;

    let summary = assistant
        .speak(&session, text, &ConsoleSink::new(quiet))
        .await?;
    finish(&assistant, &summary, wait, quiet).await;
    Ok(())
}

/// Run the `serve` command until interrupted.
pub async fn run_serve_command(
    config: Config,
    socket: Option<PathBuf>,
    no_playback: bool,
) -> Result<()> {
    let socket = socket
        .or_else(|| config.server.socket.clone())
        .unwrap_or_else(IpcServer::default_socket_path);
    let assistant = Arc::new(build_assistant(&config, no_playback)?);
    let server = IpcServer::new(socket);

    let result = tokio::select! {
        result = server.start(AssistantHandler::new(assistant.clone())) => result,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!("failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("shutting down");
            Ok(())
        }
    };

    server.stop().await?;
    assistant.stop();
    result
}

/// Serves IPC requests from one shared assistant.
pub struct AssistantHandler {
    assistant: Arc<Assistant>,
}

impl AssistantHandler {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }

    async fn run(&self, request: Request, replies: &ReplySink) -> Result<Response> {
        match request {
            Request::Process {
                audio_path,
                session,
            } => {
                let samples = tokio::task::spawn_blocking(move || load_input_file(&audio_path))
                    .await
                    .map_err(|e| VoxturnError::Other(format!("audio loader failed: {}", e)))??;
                let session = self.session(session)?;
                let summary = self.assistant.run_turn(&session, samples, replies).await?;
                Ok(Response::Done {
                    report: summary.report(),
                })
            }
            Request::Say { text, session } => {
                let session = self.session(session)?;
                let summary = self.assistant.speak(&session, &text, replies).await?;
                Ok(Response::Done {
                    report: summary.report(),
                })
            }
            Request::Interrupt => {
                self.assistant.interrupt().await;
                Ok(Response::Ok)
            }
            Request::Ping => Ok(Response::Pong),
            Request::Status => Ok(Response::Status {
                status: self.assistant.status(),
            }),
        }
    }

    fn session(&self, session: Option<SessionId>) -> Result<SessionId> {
        match session {
            Some(id) => Ok(id),
            None => self.assistant.sessions().create_session(),
        }
    }
}

/// Forwards turn events to an IPC client.
struct ReplySink(mpsc::UnboundedSender<Response>);

impl EventSink for ReplySink {
    fn emit(&self, event: TurnEvent) {
        if self.0.send(Response::Event { event }).is_err() {
            tracing::trace!("client disconnected");
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for AssistantHandler {
    async fn handle(&self, request: Request, replies: mpsc::UnboundedSender<Response>) {
        let sink = ReplySink(replies);
        let response = self
            .run(request, &sink)
            .await
            .unwrap_or_else(|e| Response::Error {
                message: e.to_string(),
            });
        if sink.0.send(response).is_err() {
            tracing::trace!("client disconnected before final response");
        }
    }
}
