use crate::defaults;
use crate::error::VoxturnError;
use crate::pipeline::orchestrator::PipelineConfig;
use crate::pipeline::segmenter::SplitPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub playback: PlaybackConfig,
    pub recognizer: RecognizerConfig,
    pub generator: GeneratorConfig,
    pub synthesizer: SynthesizerConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

/// Sentence splitting and synthesis scheduling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSection {
    pub delimiters: Vec<String>,
    pub split_policy: SplitPolicy,
    /// 0 = unbounded
    pub max_concurrent_jobs: usize,
    pub placeholder_secs: f32,
    /// 0 = never skip a missing sentence
    pub stall_timeout_ms: u64,
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub backend: PlaybackBackend,
    pub device: Option<String>,
    /// Rate of generated placeholder clips
    pub sample_rate: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackBackend {
    Cpal,
    Null,
}

/// Speech recognition backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum RecognizerConfig {
    /// Always returns `response`
    Mock {
        #[serde(default)]
        response: String,
    },
    /// External program; `{input}` in args is replaced by a WAV path
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Text generation backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// Replays fixed fragments
    Scripted {
        #[serde(default)]
        fragments: Vec<String>,
        #[serde(default)]
        delay_ms: u64,
    },
    /// OpenAI-compatible chat completions
    OpenAi {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_temperature")]
        temperature: f32,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
        #[serde(default)]
        system_prompt: Option<String>,
    },
}

/// Speech synthesis backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SynthesizerConfig {
    /// External program; `{text}`, `{output}` and `{voice}` are substituted
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        voice: Option<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Built-in beeps, one per word
    Tone {
        #[serde(default = "default_output_rate")]
        sample_rate: u32,
    },
}

/// Artifact storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

/// IPC server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Defaults to `$XDG_RUNTIME_DIR/voxturn.sock`
    pub socket: Option<PathBuf>,
}

fn default_base_url() -> String {
    defaults::OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    defaults::OPENAI_MODEL.to_string()
}

fn default_temperature() -> f32 {
    defaults::TEMPERATURE
}

fn default_max_tokens() -> u32 {
    defaults::MAX_TOKENS
}

fn default_output_rate() -> u32 {
    defaults::OUTPUT_SAMPLE_RATE
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            delimiters: defaults::SENTENCE_DELIMITERS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            split_policy: SplitPolicy::default(),
            max_concurrent_jobs: 0,
            placeholder_secs: defaults::PLACEHOLDER_SECS,
            stall_timeout_ms: defaults::STALL_TIMEOUT_MS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            backend: PlaybackBackend::Cpal,
            device: None,
            sample_rate: defaults::OUTPUT_SAMPLE_RATE,
            poll_interval_ms: defaults::PLAYBACK_POLL_MS,
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        RecognizerConfig::Command {
            program: "whisper-cli".to_string(),
            args: ["-m", "ggml-base.en.bin", "-nt", "-np", "-f", "{input}"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::OpenAi {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        SynthesizerConfig::Command {
            program: "espeak-ng".to_string(),
            args: ["-w", "{output}", "{text}"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            voice: None,
            timeout_ms: Some(30_000),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXTURN_OUTPUT_DIR → output.dir
    /// - VOXTURN_OPENAI_API_KEY → generator.api_key
    /// - VOXTURN_OPENAI_BASE_URL → generator.base_url
    /// - VOXTURN_MODEL → generator.model
    ///
    /// Generator overrides only apply to the `openai` backend.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_value("VOXTURN_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }

        if let GeneratorConfig::OpenAi {
            base_url,
            model,
            api_key,
            ..
        } = &mut self.generator
        {
            if let Some(key) = env_value("VOXTURN_OPENAI_API_KEY") {
                *api_key = Some(key);
            }
            if let Some(url) = env_value("VOXTURN_OPENAI_BASE_URL") {
                *base_url = url;
            }
            if let Some(name) = env_value("VOXTURN_MODEL") {
                *model = name;
            }
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), VoxturnError> {
        if self.pipeline.delimiters.iter().all(|d| d.is_empty()) {
            return Err(invalid("pipeline.delimiters", "must contain a delimiter"));
        }
        let secs = self.pipeline.placeholder_secs;
        if !secs.is_finite() || secs < 0.0 {
            return Err(invalid(
                "pipeline.placeholder_secs",
                "must be a non-negative number",
            ));
        }
        if self.playback.sample_rate == 0 {
            return Err(invalid("playback.sample_rate", "must be greater than 0"));
        }
        if self.playback.poll_interval_ms == 0 {
            return Err(invalid("playback.poll_interval_ms", "must be greater than 0"));
        }

        if let RecognizerConfig::Command { program, .. } = &self.recognizer
            && program.trim().is_empty()
        {
            return Err(invalid("recognizer.program", "must not be empty"));
        }
        if let GeneratorConfig::OpenAi { temperature, .. } = &self.generator
            && !temperature.is_finite()
        {
            return Err(invalid("generator.temperature", "must be a number"));
        }
        match &self.synthesizer {
            SynthesizerConfig::Command { program, .. } if program.trim().is_empty() => {
                return Err(invalid("synthesizer.program", "must not be empty"));
            }
            SynthesizerConfig::Tone { sample_rate: 0 } => {
                return Err(invalid("synthesizer.sample_rate", "must be greater than 0"));
            }
            _ => {}
        }

        Ok(())
    }

    /// Pipeline tuning derived from the `[pipeline]` and `[playback]` sections.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            delimiters: self.pipeline.delimiters.clone(),
            split_policy: self.pipeline.split_policy,
            max_concurrent_jobs: Some(self.pipeline.max_concurrent_jobs).filter(|&n| n > 0),
            stall_timeout: Some(self.pipeline.stall_timeout_ms)
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis),
            poll_interval: Duration::from_millis(self.playback.poll_interval_ms),
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxturn/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dir.join("voxturn").join("config.toml"))
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn invalid(key: &str, message: &str) -> VoxturnError {
    VoxturnError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
