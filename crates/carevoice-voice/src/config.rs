use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// API version appended to the realtime URL.
pub const DEFAULT_API_VERSION: &str = "2025-05-01-preview";
/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_INSTRUCTIONS: &str = "You are a Voice Multi-Agent Assistant that helps users prepare for medical appointments. When connecting, say: 'Voice Multi-Agent Assistant is ready! You can start speaking to get personalized appointment preparation help.'";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Connection settings for the upstream Voice Live service.
#[derive(Clone, Serialize, Deserialize)]
pub struct VoiceLiveConfig {
    /// Service endpoint, e.g. `https://my-resource.cognitiveservices.azure.com`.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Ask the service to speak a greeting as soon as the session opens.
    #[serde(default = "default_true")]
    pub greet_on_connect: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub session: SessionSettings,
}

impl Default for VoiceLiveConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_model(),
            api_version: default_api_version(),
            greet_on_connect: true,
            connect_timeout_secs: default_connect_timeout_secs(),
            session: SessionSettings::default(),
        }
    }
}

impl fmt::Debug for VoiceLiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceLiveConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("greet_on_connect", &self.greet_on_connect)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("session", &self.session)
            .finish()
    }
}

impl VoiceLiveConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn endpoint_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn key_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// True when both the endpoint and the key are present.
    pub fn is_configured(&self) -> bool {
        self.endpoint_configured() && self.key_configured()
    }

    /// Checks that a connection can be attempted.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` when the endpoint or key is missing.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if !self.is_configured() {
            return Err(VoiceError::Config(
                "Voice Live API credentials not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the realtime WebSocket URL, rewriting `https` to `wss` and
    /// `http` to `ws`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` if the endpoint is empty or uses an
    /// unsupported scheme.
    pub fn realtime_url(&self) -> Result<String, VoiceError> {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let base = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if endpoint.starts_with("wss://") || endpoint.starts_with("ws://") {
            endpoint.to_string()
        } else {
            return Err(VoiceError::Config(format!(
                "unsupported voice endpoint: {:?}",
                self.endpoint
            )));
        };
        Ok(format!(
            "{base}/voice-live/realtime?api-version={}&model={}",
            self.api_version, self.model
        ))
    }
}

/// Synthesized voice selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub temperature: f64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            name: "en-US-Ava:DragonHDLatestNeural".to_string(),
            kind: "azure-standard".to_string(),
            temperature: 0.8,
        }
    }
}

/// Server-side voice activity detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub remove_filler_words: bool,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            kind: "azure_semantic_vad".to_string(),
            threshold: 0.3,
            prefix_padding_ms: 200,
            silence_duration_ms: 200,
            remove_filler_words: false,
        }
    }
}

/// Settings sent in the `session.update` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// System instructions. `None` leaves the service default in place.
    pub instructions: Option<String>,
    pub turn_detection: TurnDetection,
    /// Noise suppression type; `None` disables it.
    pub noise_reduction: Option<String>,
    /// Echo cancellation type; `None` disables it.
    pub echo_cancellation: Option<String>,
    pub voice: VoiceSettings,
    pub transcription_model: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
            turn_detection: TurnDetection::default(),
            noise_reduction: Some("azure_deep_noise_suppression".to_string()),
            echo_cancellation: Some("server_echo_cancellation".to_string()),
            voice: VoiceSettings::default(),
            transcription_model: "whisper-1".to_string(),
        }
    }
}

impl SessionSettings {
    /// Renders the `session` object of a `session.update` command.
    pub fn to_payload(&self) -> Value {
        let mut session = json!({
            "turn_detection": self.turn_detection,
            "voice": self.voice,
            "input_audio_transcription": { "model": self.transcription_model },
        });
        if let Some(instructions) = &self.instructions {
            session["instructions"] = json!(instructions);
        }
        if let Some(kind) = &self.noise_reduction {
            session["input_audio_noise_reduction"] = json!({ "type": kind });
        }
        if let Some(kind) = &self.echo_cancellation {
            session["input_audio_echo_cancellation"] = json!({ "type": kind });
        }
        session
    }
}
