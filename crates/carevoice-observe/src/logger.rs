//! Emission of conversation-flow events.
//!
//! Every call to [`FlowLogger::emit`] writes one `tracing` event carrying a
//! fixed `flow_event` field, so flow events can be filtered out of the general
//! log stream, and returns the [`FlowRecord`] that was logged.

use crate::error::ObserveError;
use crate::event::{FlowEvent, FlowRecord};

/// Per-session flow logger.
#[derive(Debug, Clone)]
pub struct FlowLogger {
    session_id: String,
}

impl FlowLogger {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Builds the record for `event` without logging it.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Serialization` if the event cannot be
    /// serialized to JSON.
    pub fn record(&self, event: &FlowEvent) -> Result<FlowRecord, ObserveError> {
        Ok(FlowRecord {
            session_id: self.session_id.clone(),
            domain: event.domain(),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(event)?,
            occurred_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Logs `event` and returns the record.
    ///
    /// `ErrorOccurred` is logged at error level, everything else at info.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Serialization` if the event cannot be
    /// serialized to JSON. Nothing is logged in that case.
    pub fn emit(&self, event: &FlowEvent) -> Result<FlowRecord, ObserveError> {
        let record = self.record(event)?;
        match event {
            FlowEvent::ErrorOccurred { .. } => tracing::error!(
                flow_event = %record.event_type,
                domain = %record.domain,
                session_id = %record.session_id,
                payload = %record.payload,
                "conversation flow"
            ),
            _ => tracing::info!(
                flow_event = %record.event_type,
                domain = %record.domain,
                session_id = %record.session_id,
                payload = %record.payload,
                "conversation flow"
            ),
        }
        Ok(record)
    }
}
