//! Server configuration loading from file and environment variables.

use carevoice_voice::{CardPolicy, CardTiming, VoiceLiveConfig, MAX_CARD_DELAY};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Upstream Voice Live connection and session settings.
    #[serde(default)]
    pub voice: VoiceLiveConfig,

    /// Agent routing settings.
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Card delivery timing.
    #[serde(default)]
    pub cards: CardConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "carevoice_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestrationConfig {
    /// Route transcripts through the agent orchestrator. When disabled,
    /// transcripts are echoed back as speech.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Transcripts shorter than this (after trimming) are ignored.
    #[serde(default = "default_min_transcript_chars")]
    pub min_transcript_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardConfig {
    #[serde(default)]
    pub timing: CardTiming,

    /// Seconds to wait for speech to finish before sending the card anyway.
    #[serde(default = "default_fallback_secs")]
    pub fallback_secs: f64,

    /// Seconds after dispatch at which a `pre_speech` card is shown.
    #[serde(default = "default_pre_speech_secs")]
    pub pre_speech_secs: f64,

    /// Seconds after scheduling at which a card is sent even though its
    /// speech was never dispatched.
    #[serde(default = "default_stall_secs")]
    pub stall_secs: f64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_transcript_chars() -> usize {
    3
}

fn default_fallback_secs() -> f64 {
    3.0
}

fn default_pre_speech_secs() -> f64 {
    1.5
}

fn default_stall_secs() -> f64 {
    15.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_transcript_chars: default_min_transcript_chars(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            timing: CardTiming::default(),
            fallback_secs: default_fallback_secs(),
            pre_speech_secs: default_pre_speech_secs(),
            stall_secs: default_stall_secs(),
        }
    }
}

impl CardConfig {
    /// Converts to a [`CardPolicy`]. Negative or non-finite values fall back
    /// to the defaults; values above [`MAX_CARD_DELAY`] are capped.
    pub fn policy(&self) -> CardPolicy {
        let defaults = CardPolicy::default();
        let secs = |value: f64, default: Duration| {
            Duration::try_from_secs_f64(value)
                .unwrap_or(default)
                .min(MAX_CARD_DELAY)
        };
        CardPolicy {
            timing: self.timing,
            fallback: secs(self.fallback_secs, defaults.fallback),
            pre_speech: secs(self.pre_speech_secs, defaults.pre_speech),
            stall: secs(self.stall_secs, defaults.stall),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CAREVOICE_HOST` overrides `server.host`
/// - `CAREVOICE_PORT` overrides `server.port`
/// - `CAREVOICE_LOG_LEVEL` overrides `logging.level`
/// - `CAREVOICE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `CAREVOICE_VOICE_ENDPOINT` overrides `voice.endpoint`
/// - `CAREVOICE_VOICE_API_KEY` overrides `voice.api_key`
/// - `CAREVOICE_VOICE_MODEL` overrides `voice.model`
/// - `CAREVOICE_ORCHESTRATION_ENABLED` overrides `orchestration.enabled`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Applies `CAREVOICE_*` overrides looked up through `var`.
pub fn apply_overrides<F>(config: &mut Config, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = var("CAREVOICE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("CAREVOICE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("CAREVOICE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("CAREVOICE_LOG_JSON") {
        config.logging.json = parse_flag(&json);
    }
    if let Some(endpoint) = var("CAREVOICE_VOICE_ENDPOINT") {
        config.voice.endpoint = endpoint;
    }
    if let Some(key) = var("CAREVOICE_VOICE_API_KEY") {
        config.voice.api_key = key;
    }
    if let Some(model) = var("CAREVOICE_VOICE_MODEL") {
        config.voice.model = model;
    }
    if let Some(enabled) = var("CAREVOICE_ORCHESTRATION_ENABLED") {
        config.orchestration.enabled = parse_flag(&enabled);
    }
}
