//! Client-facing WebSocket messages.
//!
//! Two message families share the client socket: `type`-tagged control
//! messages (`ready`, `error`, `pong`, `card`, ...) and `Kind`-tagged media
//! envelopes (`AudioData`, `StopAudio`, `Transcription`) used by envelope
//! transport clients. Raw transport clients get binary PCM frames for audio
//! but still receive the JSON messages.

use crate::Card;
use serde::{Deserialize, Serialize};

/// Control messages sent to the client, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The voice session is connected and accepting input.
    Ready { text: String },
    /// A failure the user should see.
    Error { text: String },
    /// Reply to a client `ping`.
    Pong { text: String },
    /// The spoken reply text, sent for the client's conversation log.
    AiResponse { text: String },
    /// Informational reply on the text-only socket.
    Info { text: String },
    /// A deferred structured payload.
    Card { payload: Card },
}

impl ControlMessage {
    pub fn ready(text: impl Into<String>) -> Self {
        Self::Ready { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::Error { text: text.into() }
    }

    pub fn pong(text: impl Into<String>) -> Self {
        Self::Pong { text: text.into() }
    }

    pub fn ai_response(text: impl Into<String>) -> Self {
        Self::AiResponse { text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::Info { text: text.into() }
    }

    pub fn card(payload: Card) -> Self {
        Self::Card { payload }
    }

    /// Returns the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Error { .. } => "error",
            Self::Pong { .. } => "pong",
            Self::AiResponse { .. } => "ai_response",
            Self::Info { .. } => "info",
            Self::Card { .. } => "card",
        }
    }
}

/// Base64 audio carried inside an `AudioData` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioData {
    #[serde(rename = "Data")]
    pub data: String,
}

/// Empty marker object carried by a `StopAudio` envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StopAudio {}

/// Media envelopes, tagged by `Kind`.
///
/// The `AudioData` and `StopAudio` variants always carry both keys, with the
/// unused one set to `null`, so clients can switch on either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum MediaEnvelope {
    AudioData {
        #[serde(rename = "AudioData")]
        audio_data: AudioData,
        #[serde(rename = "StopAudio")]
        stop_audio: Option<StopAudio>,
    },
    StopAudio {
        #[serde(rename = "AudioData")]
        audio_data: Option<AudioData>,
        #[serde(rename = "StopAudio")]
        stop_audio: StopAudio,
    },
    Transcription {
        #[serde(rename = "Text")]
        text: String,
    },
}

impl MediaEnvelope {
    pub fn audio(base64_data: impl Into<String>) -> Self {
        Self::AudioData {
            audio_data: AudioData {
                data: base64_data.into(),
            },
            stop_audio: None,
        }
    }

    pub fn stop_audio() -> Self {
        Self::StopAudio {
            audio_data: None,
            stop_audio: StopAudio {},
        }
    }

    pub fn transcription(text: impl Into<String>) -> Self {
        Self::Transcription { text: text.into() }
    }
}

/// Messages the client sends as JSON text frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientInbound {
    /// Typed input, handled like a completed transcription.
    Text {
        #[serde(default)]
        text: String,
    },
    /// Liveness check.
    Ping,
    /// Any other `type` value. Ignored.
    #[serde(other)]
    Unknown,
}

/// One outbound frame on the client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl ClientFrame {
    /// Serializes a message into a text frame.
    pub fn json<T: Serialize>(message: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(message).map(Self::Text)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Returns the text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_messages_use_type_tag() {
        let value = serde_json::to_value(ControlMessage::pong("alive")).unwrap();
        assert_eq!(value, json!({"type": "pong", "text": "alive"}));

        let card = Card::new().with("title", "Prep");
        let value = serde_json::to_value(ControlMessage::card(card)).unwrap();
        assert_eq!(value, json!({"type": "card", "payload": {"title": "Prep"}}));
        assert_eq!(ControlMessage::ai_response("x").kind(), "ai_response");
    }

    #[test]
    fn media_envelopes_match_client_contract() {
        assert_eq!(
            serde_json::to_value(MediaEnvelope::audio("AAAA")).unwrap(),
            json!({"Kind": "AudioData", "AudioData": {"Data": "AAAA"}, "StopAudio": null})
        );
        assert_eq!(
            serde_json::to_value(MediaEnvelope::stop_audio()).unwrap(),
            json!({"Kind": "StopAudio", "AudioData": null, "StopAudio": {}})
        );
        assert_eq!(
            serde_json::to_value(MediaEnvelope::transcription("hello")).unwrap(),
            json!({"Kind": "Transcription", "Text": "hello"})
        );
    }

    #[test]
    fn inbound_tolerates_unknown_types() {
        let parsed: ClientInbound = serde_json::from_str(r#"{"type":"text","text":"hi"}"#).unwrap();
        assert_eq!(parsed, ClientInbound::Text { text: "hi".into() });

        let parsed: ClientInbound = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed, ClientInbound::Ping);

        let parsed: ClientInbound = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        assert_eq!(parsed, ClientInbound::Unknown);

        assert!(serde_json::from_str::<ClientInbound>("not json").is_err());
    }
}
