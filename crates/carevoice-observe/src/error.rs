//! Error types for the conversation-flow layer.

/// Errors that can occur while recording a flow event.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// JSON serialization of the event payload failed.
    #[error("observe serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
