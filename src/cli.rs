//! Command-line interface for voxturn
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Spoken replies to spoken questions, one sentence at a time
#[derive(Parser, Debug)]
#[command(
    name = "voxturn",
    version,
    about = "Voice assistant that speaks its reply while it is still being written"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write clips without playing them
    #[arg(long, global = true)]
    pub no_playback: bool,

    /// Longest time to wait for playback to finish (e.g. 30s, 2m)
    #[arg(long, global = true, value_name = "DURATION", default_value = "2m", value_parser = parse_wait)]
    pub wait: Duration,
}

/// Parse a wait duration.
///
/// Supports any duration format accepted by `humantime`; a bare number is
/// read as seconds.
fn parse_wait(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one recorded question (WAV file) and play the reply
    Run {
        /// Recorded speech
        #[arg(value_name = "WAV")]
        audio: PathBuf,

        /// Continue an existing session
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Speak the given text without recognition or generation
    Say {
        text: String,

        /// Continue an existing session
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Serve requests over a Unix socket (foreground process)
    Serve {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Send a request to a running server
    Send {
        #[command(subcommand)]
        request: SendAction,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/voxturn.sock)
        #[arg(long, global = true, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List available audio output devices
    Devices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Requests understood by `voxturn serve`
#[derive(Subcommand, Debug)]
pub enum SendAction {
    /// Run a turn on a WAV file readable by the server
    Process {
        audio: PathBuf,
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Speak text
    Say {
        text: String,
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Stop the current reply
    Interrupt,
    /// Check that the server is alive
    Ping,
    /// Show pipeline status
    Status,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Log filter derived from -q/-v; `RUST_LOG` takes precedence.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}
