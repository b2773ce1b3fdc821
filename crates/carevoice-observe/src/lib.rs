//! Conversation-flow observability for CareVoice sessions.
//!
//! Records what happened in a voice session (user input, agent routing,
//! upstream voice events, card delivery, failures) as structured `tracing`
//! events. Each event is also returned as a serializable [`FlowRecord`], so
//! callers and tests can inspect exactly what was logged.
//!
//! # Flow domains
//!
//! | Domain | Example events |
//! |--------|---------------|
//! | `CONVERSATION` | `CONVERSATION_STARTED`, `USER_MESSAGE`, `CONVERSATION_ENDED` |
//! | `AGENT` | `AGENT_PROCESSING`, `AGENT_RESPONSE` |
//! | `VOICE` | `VOICE_API_EVENT` |
//! | `DELIVERY` | `CARD_DELIVERED` |
//! | `ERROR` | `ERROR_OCCURRED` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use carevoice_observe::{FlowEvent, FlowLogger};
//!
//! let flow = FlowLogger::new(session_id.to_string());
//! flow.emit(&FlowEvent::user_message(&transcript))?;
//! ```

mod error;
mod event;
mod logger;

pub use error::ObserveError;
pub use event::{FlowDomain, FlowEvent, FlowRecord, ParseFlowDomainError, USER_MESSAGE_PREVIEW_CHARS};
pub use logger::FlowLogger;

#[cfg(test)]
mod tests;
