//! Events received from the upstream voice service.

use crate::error::VoiceError;
use serde::Deserialize;
use serde_json::Value;

/// Error detail attached to `error` and transcription-failure events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (None, Some(message)) => f.write_str(message),
            (Some(code), None) => f.write_str(code),
            (None, None) => f.write_str("unknown error"),
        }
    }
}

/// Summary of a finished response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_details: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
}

/// Upstream events, tagged by `type`. Types this server does not act on
/// deserialize to [`UpstreamEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: SessionInfo,
    },

    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared,

    /// The user started talking; any audio still playing should stop.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        #[serde(default)]
        error: ErrorDetail,
    },

    /// The in-flight response finished (completed, cancelled, or failed).
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseSummary,
    },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    /// A chunk of synthesized audio, base64 encoded.
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: ErrorDetail,
    },

    #[serde(other)]
    Unknown,
}

/// A parsed upstream frame: the raw `type` string plus the typed event.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamMessage {
    pub event_type: String,
    pub event: UpstreamEvent,
}

impl UpstreamMessage {
    /// Parses one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::MalformedEvent` if the frame is not JSON, has no
    /// string `type`, or a known event carries fields of the wrong shape.
    pub fn parse(text: &str) -> Result<Self, VoiceError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| VoiceError::MalformedEvent(e.to_string()))?;
        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| VoiceError::MalformedEvent("missing event type".to_string()))?
            .to_string();
        let event = serde_json::from_value(value)
            .map_err(|e| VoiceError::MalformedEvent(format!("{event_type}: {e}")))?;
        Ok(Self { event_type, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_done() {
        let msg = UpstreamMessage::parse(
            r#"{"type":"response.done","response":{"id":"resp_1","status":"completed"}}"#,
        )
        .unwrap();
        assert_eq!(msg.event_type, "response.done");
        match msg.event {
            UpstreamEvent::ResponseDone { response } => {
                assert_eq!(response.id.as_deref(), Some("resp_1"));
                assert_eq!(response.status.as_deref(), Some("completed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_transcription_and_audio() {
        let msg = UpstreamMessage::parse(
            r#"{"type":"conversation.item.input_audio_transcription.completed","item_id":"i1","transcript":"hello there"}"#,
        )
        .unwrap();
        assert_eq!(
            msg.event,
            UpstreamEvent::TranscriptionCompleted {
                transcript: "hello there".into()
            }
        );

        let msg = UpstreamMessage::parse(r#"{"type":"response.audio.delta","delta":"AAEC"}"#)
            .unwrap();
        assert_eq!(
            msg.event,
            UpstreamEvent::AudioDelta {
                delta: "AAEC".into()
            }
        );
    }

    #[test]
    fn unknown_types_keep_their_name() {
        let msg =
            UpstreamMessage::parse(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert_eq!(msg.event, UpstreamEvent::Unknown);
        assert_eq!(msg.event_type, "rate_limits.updated");
    }

    #[test]
    fn error_detail_formats_code_and_message() {
        let msg = UpstreamMessage::parse(
            r#"{"type":"error","error":{"type":"invalid_request_error","code":"bad_audio","message":"Audio too short"}}"#,
        )
        .unwrap();
        match msg.event {
            UpstreamEvent::Error { error } => {
                assert_eq!(error.to_string(), "bad_audio: Audio too short")
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            UpstreamMessage::parse("{not json"),
            Err(VoiceError::MalformedEvent(_))
        ));
        assert!(matches!(
            UpstreamMessage::parse(r#"{"delta":"AAEC"}"#),
            Err(VoiceError::MalformedEvent(_))
        ));
        assert!(matches!(
            UpstreamMessage::parse(r#"{"type":"response.audio.delta","delta":42}"#),
            Err(VoiceError::MalformedEvent(_))
        ));
    }
}
