use crate::error::AgentError;
use carevoice_types::Card;
use serde::{Deserialize, Serialize};

/// One agent invocation in an orchestration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTrace {
    pub agent: String,
    pub function: String,
}

impl AgentTrace {
    pub fn new(agent: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            function: function.into(),
        }
    }
}

/// The outcome of routing one query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationResult {
    /// Text for the voice service to speak. May be empty.
    pub spoken: String,
    /// Structured payload for the client. Carries the agent trace under
    /// `agents` when present.
    pub card: Option<Card>,
    /// Name of the intent that handled the query.
    pub intent: String,
    pub agents: Vec<AgentTrace>,
}

impl OrchestrationResult {
    /// The agent that produced the reply (last in the chain).
    pub fn responding_agent(&self) -> Option<&str> {
        self.agents.last().map(|trace| trace.agent.as_str())
    }
}

/// Description of one routable intent, for listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSummary {
    pub intent: String,
    pub keywords: Vec<String>,
    pub agents: Vec<String>,
    pub has_card: bool,
}

/// Routes a user query to agents.
///
/// Implementations must be cheap to call from a session task; anything slow
/// belongs behind `tokio::task::spawn_blocking` at the call site.
pub trait Orchestrator: Send + Sync {
    fn name(&self) -> &str;

    /// Produces a reply for `query`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::EmptyQuery` for blank input, or
    /// `AgentError::AgentFailed` when an agent in the chain fails.
    fn orchestrate(&self, query: &str) -> Result<OrchestrationResult, AgentError>;

    /// The intents this orchestrator can route to.
    fn intents(&self) -> Vec<IntentSummary> {
        Vec::new()
    }
}
