use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("agent {agent} failed: {reason}")]
    AgentFailed { agent: String, reason: String },
}
