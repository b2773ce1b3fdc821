//! Keyword rule table and the orchestrator that walks it.

use crate::error::AgentError;
use crate::orchestrator::{AgentTrace, IntentSummary, OrchestrationResult, Orchestrator};
use carevoice_types::Card;
use serde_json::{json, Value};

/// Appointment intents the rule table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Cardiology,
    Dermatology,
    /// Physicals and general check-ups. Starts the family-history dialog.
    GeneralCheckup,
    Medication,
    /// Nothing matched.
    Adaptive,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cardiology => "cardiology",
            Self::Dermatology => "dermatology",
            Self::GeneralCheckup => "general_checkup",
            Self::Medication => "medication",
            Self::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct Rule {
    pub intent: Intent,
    /// Lowercase substrings; any match selects the rule.
    pub keywords: &'static [&'static str],
    /// `(agent, function)` pairs, in invocation order.
    pub chain: &'static [(&'static str, &'static str)],
    pub spoken: &'static str,
    pub card: Option<fn(&str) -> Card>,
}

impl Rule {
    fn matches(&self, query_lower: &str) -> bool {
        self.keywords.iter().any(|kw| query_lower.contains(kw))
    }
}

const CARDIOLOGY: Rule = Rule {
    intent: Intent::Cardiology,
    keywords: &["cardiology", "heart", "cardiac", "chest pain"],
    chain: &[
        ("InfoAgent", "checklist"),
        ("PatientContextAgent", "context"),
        ("CardiologyAgent", "extract_symptoms"),
        ("CardiologyAgent", "recommend_tests"),
        ("ActionAgent", "final_checklist"),
    ],
    spoken: "I'll help you prepare for your cardiology appointment. Bring your recent EKG results, a blood pressure log if you keep one, and a complete list of your heart medications. I've put the full checklist on your screen. To make this more specific, can you tell me when your chest pain typically occurs?",
    card: Some(cardiology_card),
};

const DERMATOLOGY: Rule = Rule {
    intent: Intent::Dermatology,
    keywords: &["dermatology", "skin", "mole", "rash"],
    chain: &[
        ("InfoAgent", "checklist"),
        ("ActionAgent", "final_checklist"),
    ],
    spoken: "For your dermatology appointment, bring photos of any skin changes, a list of your skincare products and medications, and any family history of skin conditions. What specific skin concerns would you like to discuss with your dermatologist?",
    card: Some(dermatology_card),
};

const GENERAL_CHECKUP: Rule = Rule {
    intent: Intent::GeneralCheckup,
    keywords: &["general", "primary care", "physical", "checkup", "check-up"],
    chain: &[("FamilyHistoryAgent", "start_dialog")],
    spoken: "Since you have a physical coming up, let's go over your family history first. Has anyone in your immediate family had heart disease, diabetes, or cancer?",
    card: None,
};

const MEDICATION: Rule = Rule {
    intent: Intent::Medication,
    keywords: &["medication", "drug", "prescription"],
    chain: &[
        ("PatientContextAgent", "context"),
        ("ActionAgent", "final_checklist"),
    ],
    spoken: "Your current medications include Lisinopril and Metoprolol for your heart conditions. It's great that you've been consistent with taking them. Are you taking any other medications or supplements?",
    card: Some(medication_card),
};

const ADAPTIVE: Rule = Rule {
    intent: Intent::Adaptive,
    keywords: &[],
    chain: &[
        ("InfoAgent", "checklist"),
        ("ActionAgent", "final_checklist"),
    ],
    spoken: "To prepare for your medical appointment, gather your recent medical records, a complete list of your medications, and your questions for the doctor. Can you tell me more about the main reason for your visit?",
    card: Some(adaptive_card),
};

/// Rule-table orchestrator. The first matching rule wins; the fallback rule
/// handles everything else.
#[derive(Debug, Clone)]
pub struct RuleOrchestrator {
    rules: Vec<Rule>,
    fallback: Rule,
}

impl Default for RuleOrchestrator {
    fn default() -> Self {
        Self::new(
            vec![CARDIOLOGY, DERMATOLOGY, GENERAL_CHECKUP, MEDICATION],
            ADAPTIVE,
        )
    }
}

impl RuleOrchestrator {
    pub fn new(rules: Vec<Rule>, fallback: Rule) -> Self {
        Self { rules, fallback }
    }

    /// Picks the rule for `query`. Matching is case-insensitive.
    pub fn classify(&self, query: &str) -> &Rule {
        let lower = query.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lower))
            .unwrap_or(&self.fallback)
    }
}

impl Orchestrator for RuleOrchestrator {
    fn name(&self) -> &str {
        "rules"
    }

    fn orchestrate(&self, query: &str) -> Result<OrchestrationResult, AgentError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::EmptyQuery);
        }

        let rule = self.classify(query);
        let agents: Vec<AgentTrace> = rule
            .chain
            .iter()
            .map(|(agent, function)| AgentTrace::new(*agent, *function))
            .collect();
        for trace in &agents {
            tracing::debug!(intent = %rule.intent, agent = %trace.agent, function = %trace.function, "agent invoked");
        }

        let card = rule.card.map(|build| {
            build(query).with(
                "agents",
                Value::Array(
                    agents
                        .iter()
                        .map(|t| json!({"agent": t.agent, "function": t.function}))
                        .collect(),
                ),
            )
        });

        Ok(OrchestrationResult {
            spoken: rule.spoken.to_string(),
            card,
            intent: rule.intent.as_str().to_string(),
            agents,
        })
    }

    fn intents(&self) -> Vec<IntentSummary> {
        self.rules
            .iter()
            .chain(std::iter::once(&self.fallback))
            .map(|rule| IntentSummary {
                intent: rule.intent.as_str().to_string(),
                keywords: rule.keywords.iter().map(|k| k.to_string()).collect(),
                agents: rule.chain.iter().map(|(agent, _)| agent.to_string()).collect(),
                has_card: rule.card.is_some(),
            })
            .collect()
    }
}

fn cardiology_card(query: &str) -> Card {
    Card::new()
        .with("title", "Cardiology Appointment Checklist")
        .with(
            "appointment_details",
            json!({
                "doctor": "Doctor mentioned in conversation",
                "reason": query,
                "timing": "As mentioned by user",
            }),
        )
        .with(
            "preparation_items",
            json!([
                "Bring current medications list",
                "Document chest pain episodes with dates and severity",
                "Prepare questions about treatment options",
                "Bring insurance cards and ID",
                "List family history of heart conditions",
                "Recent medical records",
                "Symptom log",
            ]),
        )
        .with(
            "questions_to_ask",
            json!([
                "What could be causing my chest pain?",
                "What tests do you recommend?",
                "Are there lifestyle changes I should make?",
                "When should I be concerned about symptoms?",
                "What are my treatment options?",
            ]),
        )
        .with(
            "follow_up_actions",
            json!([
                "Schedule any recommended tests",
                "Follow medication instructions",
                "Monitor symptoms as directed",
                "Keep symptom diary",
                "Follow up as scheduled",
            ]),
        )
        .with(
            "recommended_tests",
            json!(["Electrocardiogram (EKG)", "Echocardiogram", "Stress test", "Lipid panel"]),
        )
}

fn dermatology_card(query: &str) -> Card {
    Card::new()
        .with("title", "Dermatology Appointment Checklist")
        .with("appointment_details", json!({ "reason": query }))
        .with(
            "preparation_items",
            json!([
                "Photos of skin changes or concerning areas",
                "List of current skincare products and medications",
                "Family history of skin conditions or skin cancer",
                "Record of sun exposure and sunscreen use",
                "Any symptoms (itching, pain, changes in moles)",
                "Questions about skin care routine or treatments",
            ]),
        )
}

fn medication_card(_query: &str) -> Card {
    Card::new()
        .with("title", "Medication Review")
        .with(
            "current_medications",
            json!(["Lisinopril 10mg daily", "Metoprolol 25mg twice daily"]),
        )
        .with(
            "follow_up_actions",
            json!([
                "Update your medication list",
                "Note any side effects since your last visit",
                "Bring supplements and over-the-counter drugs too",
            ]),
        )
}

fn adaptive_card(query: &str) -> Card {
    Card::new()
        .with("title", "Appointment Preparation Checklist")
        .with("appointment_details", json!({ "reason": query }))
        .with(
            "preparation_items",
            json!([
                "Recent medical records relevant to your concern",
                "Complete list of current medications (including supplements)",
                "Log of symptoms related to your visit",
                "Family history relevant to your condition",
                "List of questions for the doctor",
                "Insurance cards and identification",
            ]),
        )
}
