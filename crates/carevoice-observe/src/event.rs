//! Flow domain, event, and record types for conversation tracing.

use serde::{Deserialize, Serialize};

/// Maximum number of characters of user input kept in a flow event.
pub const USER_MESSAGE_PREVIEW_CHARS: usize = 100;

/// Conversation-flow domains.
///
/// Each domain groups related event types so log pipelines can filter on a
/// single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowDomain {
    /// Session lifecycle and user input.
    #[serde(rename = "CONVERSATION")]
    Conversation,
    /// Orchestration and agent output.
    #[serde(rename = "AGENT")]
    Agent,
    /// Events received from the upstream voice service.
    #[serde(rename = "VOICE")]
    Voice,
    /// Card delivery to the client.
    #[serde(rename = "DELIVERY")]
    Delivery,
    /// Failures surfaced during a session.
    #[serde(rename = "ERROR")]
    Error,
}

impl FlowDomain {
    /// Returns the canonical string label for this domain.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "CONVERSATION",
            Self::Agent => "AGENT",
            Self::Voice => "VOICE",
            Self::Delivery => "DELIVERY",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for FlowDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlowDomain {
    type Err = ParseFlowDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONVERSATION" => Ok(Self::Conversation),
            "AGENT" => Ok(Self::Agent),
            "VOICE" => Ok(Self::Voice),
            "DELIVERY" => Ok(Self::Delivery),
            "ERROR" => Ok(Self::Error),
            _ => Err(ParseFlowDomainError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown flow domain string.
#[derive(Debug, Clone)]
pub struct ParseFlowDomainError(pub String);

impl std::fmt::Display for ParseFlowDomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown flow domain: {}", self.0)
    }
}

impl std::error::Error for ParseFlowDomainError {}

/// Structured conversation-flow events.
///
/// Each variant corresponds to one `event_type` string and serializes to a
/// JSON object tagged with `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowEvent {
    // ── Conversation domain ──────────────────────────────────────────
    /// A client connected and a session was created.
    ConversationStarted {
        /// The negotiated client transport (`raw`, `envelope`, `text`).
        transport: String,
    },

    /// The session ended.
    ConversationEnded {
        /// Why the session ended (e.g. `client_closed`, `upstream_closed`).
        reason: String,
    },

    /// The user said or typed something. Use [`FlowEvent::user_message`] to
    /// build this so the content is truncated.
    UserMessage {
        /// At most [`USER_MESSAGE_PREVIEW_CHARS`] characters, plus `...`.
        content: String,
        /// Character count of the untruncated input.
        length: usize,
    },

    // ── Agent domain ─────────────────────────────────────────────────
    /// An agent started working on a query.
    AgentProcessing {
        agent: String,
        action: String,
    },

    /// An agent produced a reply.
    AgentResponse {
        agent: String,
        /// Character count of the spoken reply.
        response_length: usize,
        has_card: bool,
    },

    // ── Voice domain ─────────────────────────────────────────────────
    /// An event arrived from the upstream voice service.
    VoiceApiEvent {
        /// The upstream `type` string.
        event_type: String,
        detail: Option<String>,
    },

    // ── Delivery domain ──────────────────────────────────────────────
    /// A card reached the client.
    CardDelivered {
        /// `completion`, `fallback`, `stalled` or `immediate`.
        path: String,
        title: Option<String>,
    },

    // ── Error domain ─────────────────────────────────────────────────
    /// Something failed during the session.
    ErrorOccurred {
        /// Where the failure happened (e.g. `orchestration`, `upstream_send`).
        context: String,
        message: String,
    },
}

impl FlowEvent {
    /// Builds a `UserMessage`, truncating long input.
    pub fn user_message(text: &str) -> Self {
        let length = text.chars().count();
        let content = if length > USER_MESSAGE_PREVIEW_CHARS {
            let mut preview: String = text.chars().take(USER_MESSAGE_PREVIEW_CHARS).collect();
            preview.push_str("...");
            preview
        } else {
            text.to_string()
        };
        Self::UserMessage { content, length }
    }

    /// Returns the canonical event type string for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConversationStarted { .. } => "CONVERSATION_STARTED",
            Self::ConversationEnded { .. } => "CONVERSATION_ENDED",
            Self::UserMessage { .. } => "USER_MESSAGE",
            Self::AgentProcessing { .. } => "AGENT_PROCESSING",
            Self::AgentResponse { .. } => "AGENT_RESPONSE",
            Self::VoiceApiEvent { .. } => "VOICE_API_EVENT",
            Self::CardDelivered { .. } => "CARD_DELIVERED",
            Self::ErrorOccurred { .. } => "ERROR_OCCURRED",
        }
    }

    /// Returns the domain for this event.
    pub fn domain(&self) -> FlowDomain {
        match self {
            Self::ConversationStarted { .. }
            | Self::ConversationEnded { .. }
            | Self::UserMessage { .. } => FlowDomain::Conversation,
            Self::AgentProcessing { .. } | Self::AgentResponse { .. } => FlowDomain::Agent,
            Self::VoiceApiEvent { .. } => FlowDomain::Voice,
            Self::CardDelivered { .. } => FlowDomain::Delivery,
            Self::ErrorOccurred { .. } => FlowDomain::Error,
        }
    }
}

/// A flow event as it was logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    /// The session the event belongs to.
    pub session_id: String,
    pub domain: FlowDomain,
    /// The specific event type (e.g., `USER_MESSAGE`).
    pub event_type: String,
    /// The serialized event, including its `event` tag.
    pub payload: serde_json::Value,
    /// RFC 3339 timestamp of when the event was recorded.
    pub occurred_at: String,
}
