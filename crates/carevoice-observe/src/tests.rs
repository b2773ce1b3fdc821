//! Unit tests for conversation-flow events.

use crate::event::{FlowDomain, FlowEvent, USER_MESSAGE_PREVIEW_CHARS};
use crate::logger::FlowLogger;

// ── Domain labels ────────────────────────────────────────────────────

#[test]
fn domain_labels_round_trip_through_from_str() {
    for domain in [
        FlowDomain::Conversation,
        FlowDomain::Agent,
        FlowDomain::Voice,
        FlowDomain::Delivery,
        FlowDomain::Error,
    ] {
        let parsed: FlowDomain = domain.as_str().parse().expect("label should parse");
        assert_eq!(parsed, domain);
    }
    assert!("PRESENCE".parse::<FlowDomain>().is_err());
}

#[test]
fn domain_serializes_as_uppercase_label() {
    let json = serde_json::to_string(&FlowDomain::Delivery).unwrap();
    assert_eq!(json, "\"DELIVERY\"");
}

// ── Event classification ─────────────────────────────────────────────

#[test]
fn events_map_to_their_domains() {
    let cases = [
        (
            FlowEvent::ConversationStarted {
                transport: "raw".into(),
            },
            FlowDomain::Conversation,
            "CONVERSATION_STARTED",
        ),
        (
            FlowEvent::AgentResponse {
                agent: "cardiology".into(),
                response_length: 42,
                has_card: true,
            },
            FlowDomain::Agent,
            "AGENT_RESPONSE",
        ),
        (
            FlowEvent::VoiceApiEvent {
                event_type: "response.done".into(),
                detail: None,
            },
            FlowDomain::Voice,
            "VOICE_API_EVENT",
        ),
        (
            FlowEvent::CardDelivered {
                path: "fallback".into(),
                title: None,
            },
            FlowDomain::Delivery,
            "CARD_DELIVERED",
        ),
        (
            FlowEvent::ErrorOccurred {
                context: "orchestration".into(),
                message: "boom".into(),
            },
            FlowDomain::Error,
            "ERROR_OCCURRED",
        ),
    ];

    for (event, domain, event_type) in cases {
        assert_eq!(event.domain(), domain);
        assert_eq!(event.event_type(), event_type);
    }
}

#[test]
fn user_message_keeps_short_input_intact() {
    match FlowEvent::user_message("I have a cardiology appointment") {
        FlowEvent::UserMessage { content, length } => {
            assert_eq!(content, "I have a cardiology appointment");
            assert_eq!(length, 31);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn user_message_truncates_long_input() {
    let long = "a".repeat(250);
    match FlowEvent::user_message(&long) {
        FlowEvent::UserMessage { content, length } => {
            assert_eq!(length, 250);
            assert_eq!(content.len(), USER_MESSAGE_PREVIEW_CHARS + 3);
            assert!(content.ends_with("..."));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn user_message_truncates_on_char_boundaries() {
    let long = "é".repeat(120);
    match FlowEvent::user_message(&long) {
        FlowEvent::UserMessage { content, length } => {
            assert_eq!(length, 120);
            assert_eq!(content.chars().count(), USER_MESSAGE_PREVIEW_CHARS + 3);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

// ── Logger ───────────────────────────────────────────────────────────

#[test]
fn emit_returns_tagged_record() {
    let flow = FlowLogger::new("session-1");
    let record = flow
        .emit(&FlowEvent::CardDelivered {
            path: "completion".into(),
            title: Some("Cardiology Appointment Checklist".into()),
        })
        .expect("emit should succeed");

    assert_eq!(record.session_id, "session-1");
    assert_eq!(record.domain, FlowDomain::Delivery);
    assert_eq!(record.event_type, "CARD_DELIVERED");
    assert_eq!(record.payload["event"], "CARD_DELIVERED");
    assert_eq!(record.payload["path"], "completion");
    assert!(
        chrono::DateTime::parse_from_rfc3339(&record.occurred_at).is_ok(),
        "timestamp should be RFC 3339: {}",
        record.occurred_at
    );
}

#[test]
fn record_payload_deserializes_back_to_event() {
    let flow = FlowLogger::new("session-2");
    let event = FlowEvent::ErrorOccurred {
        context: "upstream_send".into(),
        message: "socket closed".into(),
    };
    let record = flow.record(&event).expect("record should succeed");

    let restored: FlowEvent =
        serde_json::from_value(record.payload).expect("payload should deserialize");
    assert_eq!(restored, event);
}
