//! Orchestration for CareVoice.
//!
//! An [`Orchestrator`] turns a user query into a spoken reply and an
//! optional [`Card`](carevoice_types::Card). The shipped implementation,
//! [`RuleOrchestrator`], classifies the query with a keyword rule table and
//! fills canned templates; it makes no network calls.

pub mod error;
pub mod orchestrator;
pub mod rules;

pub use error::AgentError;
pub use orchestrator::{AgentTrace, IntentSummary, OrchestrationResult, Orchestrator};
pub use rules::{Intent, Rule, RuleOrchestrator};
