use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use voxturn::app::{ConsoleSink, run_say_command, run_serve_command, run_turn_command};
use voxturn::cli::{Cli, Commands, ConfigAction, SendAction};
use voxturn::config::Config;
use voxturn::ipc::client::send_request;
use voxturn::ipc::protocol::{Request, Response};
use voxturn::ipc::server::IpcServer;
use voxturn::pipeline::events::EventSink;
use voxturn::session::SessionId;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Run { audio, session } => {
            let config = load_config(cli.config.as_deref())?;
            run_turn_command(
                config,
                &audio,
                session.as_deref(),
                cli.quiet,
                cli.no_playback,
                cli.wait,
            )
            .await?;
        }
        Commands::Say { text, session } => {
            let config = load_config(cli.config.as_deref())?;
            run_say_command(
                config,
                &text,
                session.as_deref(),
                cli.quiet,
                cli.no_playback,
                cli.wait,
            )
            .await?;
        }
        Commands::Serve { socket } => {
            let config = load_config(cli.config.as_deref())?;
            run_serve_command(config, socket, cli.no_playback).await?;
        }
        Commands::Send { request, socket } => {
            let config = load_config(cli.config.as_deref())?;
            let socket = socket
                .or(config.server.socket)
                .unwrap_or_else(IpcServer::default_socket_path);
            handle_send_command(&socket, request, cli.quiet).await?;
        }
        Commands::Devices => {
            list_output_devices()?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "voxturn", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the -q/-v level.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxturn={}", cli.log_filter())));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxturn/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()?)?,
    };

    Ok(config.with_env_overrides())
}

fn config_path(custom_path: Option<&Path>) -> Result<PathBuf> {
    match custom_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path(),
    }
}

/// List available audio output devices.
#[cfg(feature = "cpal-audio")]
fn list_output_devices() -> Result<()> {
    let devices = voxturn::audio::output::list_output_devices()?;

    if devices.is_empty() {
        eprintln!("No audio output devices found");
        std::process::exit(1);
    }

    println!("Available audio output devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_output_devices() -> Result<()> {
    anyhow::bail!("built without audio output support (enable the `cpal-audio` feature)")
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path(custom_path)?.display());
        }
    }
    Ok(())
}

/// Send a request to the server and render its responses.
async fn handle_send_command(socket: &Path, action: SendAction, quiet: bool) -> Result<()> {
    let request = match action {
        SendAction::Process { audio, session } => Request::Process {
            audio_path: std::fs::canonicalize(&audio).unwrap_or(audio),
            session: session.as_deref().map(SessionId::parse).transpose()?,
        },
        SendAction::Say { text, session } => Request::Say {
            text,
            session: session.as_deref().map(SessionId::parse).transpose()?,
        },
        SendAction::Interrupt => Request::Interrupt,
        SendAction::Ping => Request::Ping,
        SendAction::Status => Request::Status,
    };

    let sink = ConsoleSink::new(quiet);
    let result = send_request(socket, &request, |response| {
        if let Response::Event { event } = response {
            sink.emit(event.clone());
        }
    })
    .await;

    match result {
        Ok(Response::Done { report }) => {
            if !quiet {
                println!(
                    "{} {} in {} ({} sentences)",
                    "Done:".green(),
                    report.turn,
                    report.session,
                    report.sentences
                );
                for issue in &report.issues {
                    println!("  {} {}", "!".yellow(), issue);
                }
            }
        }
        Ok(Response::Status { status }) => {
            println!("Status:");
            println!("  {}       {}", "Turn:".dimmed(), status.turn);
            println!(
                "  {}    {}",
                "Playing:".dimmed(),
                if status.playing { "yes" } else { "no" }
            );
            println!("  {}     {}", "Queued:".dimmed(), status.queued);
            println!("  {}   {}", "Buffered:".dimmed(), status.buffered);
            println!("  {}       {}", "Next:".dimmed(), status.next_expected);
            if let Some(sequence) = status.stalled {
                println!("  {}    {}", "Waiting:".dimmed(), sequence.yellow());
            }
        }
        Ok(Response::Pong) => println!("{}", "pong".green()),
        Ok(Response::Ok) => println!("{}", "ok".green()),
        Ok(Response::Error { message }) => {
            eprintln!("{}", format!("Error: {}", message).red());
            std::process::exit(1);
        }
        Ok(Response::Event { .. }) => {}
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to communicate with server: {}", e).red()
            );
            eprintln!("Is the server running? Start it with: voxturn serve");
            std::process::exit(1);
        }
    }

    Ok(())
}
