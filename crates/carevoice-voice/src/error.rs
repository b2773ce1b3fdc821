use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Voice Live API connection failed: {0}")]
    Connect(String),

    #[error("Voice Live API send failed: {0}")]
    Send(String),

    #[error("Malformed upstream event: {0}")]
    MalformedEvent(String),

    #[error("Command encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("A response is already in flight")]
    AlreadyActive,

    #[error("Voice Live API connection closed")]
    Closed,
}
