//! Commands sent to the upstream voice service.

use crate::config::SessionSettings;
use crate::error::VoiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker role of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content part of a conversation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text the assistant should speak.
    Text { text: String },
    /// Typed user input.
    InputText { text: String },
}

/// A `message` conversation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: Role,
    pub content: Vec<ContentPart>,
}

/// Upstream commands, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamCommand {
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },

    #[serde(rename = "response.create")]
    ResponseCreate,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64 PCM audio.
        audio: String,
    },
}

impl UpstreamCommand {
    pub fn session_update(settings: &SessionSettings) -> Self {
        Self::SessionUpdate {
            session: settings.to_payload(),
        }
    }

    pub fn response_create() -> Self {
        Self::ResponseCreate
    }

    /// An assistant message whose text the service will speak on the next
    /// `response.create`.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: Role::Assistant,
                content: vec![ContentPart::Text { text: text.into() }],
            },
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: Role::User,
                content: vec![ContentPart::InputText { text: text.into() }],
            },
        }
    }

    pub fn append_audio(base64_audio: impl Into<String>) -> Self {
        Self::InputAudioBufferAppend {
            audio: base64_audio.into(),
        }
    }

    /// Returns the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ResponseCreate => "response.create",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
        }
    }

    /// Serializes the command to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Encode` if serialization fails.
    pub fn to_json(&self) -> Result<String, VoiceError> {
        Ok(serde_json::to_string(self)?)
    }
}
