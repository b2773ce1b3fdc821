//! Shared types for the CareVoice workspace.
//!
//! This crate holds the definitions that cross crate boundaries: the
//! structured [`Card`] payload produced by orchestration, the client-facing
//! wire messages, and the negotiated client transport. No crate in the
//! workspace depends on anything *except* `carevoice-types` for cross-cutting
//! type definitions, which keeps the dependency graph acyclic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod client;

pub use client::{AudioData, ClientFrame, ClientInbound, ControlMessage, MediaEnvelope, StopAudio};

/// A structured, non-spoken payload for the client's UI layer.
///
/// Cards are opaque key-value documents. The server never inspects them
/// beyond attaching the agent trace; they are delivered to the client as the
/// `payload` of a `{"type": "card"}` message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card(Map<String, Value>);

impl Card {
    /// Creates an empty card.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a field, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the card title, if it has a string `title` field.
    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Field names, in insertion order of the underlying map.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Card {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Card {
    type Error = CardError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CardError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Errors raised when building a [`Card`] from arbitrary JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CardError {
    /// The JSON value was not an object.
    #[error("card payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Audio transport negotiated with the client when the voice socket opens.
///
/// `Raw` clients receive synthesized audio as binary PCM frames. `Envelope`
/// clients receive every media event as a JSON [`MediaEnvelope`] with the
/// audio left base64-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientTransport {
    /// Binary PCM frames.
    #[default]
    Raw,
    /// JSON envelopes (`{"Kind": ...}`).
    Envelope,
}

impl ClientTransport {
    /// Returns the string label for this transport.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Envelope => "envelope",
        }
    }

    pub fn is_raw(self) -> bool {
        matches!(self, Self::Raw)
    }
}

impl std::fmt::Display for ClientTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientTransport {
    type Err = ParseTransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "envelope" | "json" => Ok(Self::Envelope),
            _ => Err(ParseTransportError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown client transport string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown client transport: {0}")]
pub struct ParseTransportError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_serializes_as_plain_object() {
        let card = Card::new()
            .with("title", "Cardiology Appointment Checklist")
            .with("preparation_items", json!(["Medication list", "Photo ID"]));

        let value = serde_json::to_value(&card).unwrap();
        assert_eq!(value["title"], "Cardiology Appointment Checklist");
        assert_eq!(value["preparation_items"][1], "Photo ID");
        assert_eq!(card.title(), Some("Cardiology Appointment Checklist"));
    }

    #[test]
    fn card_rejects_non_object_json() {
        assert_eq!(
            Card::try_from(json!(["a"])),
            Err(CardError::NotAnObject("array"))
        );
        let card = Card::try_from(json!({"title": "x"})).unwrap();
        assert_eq!(card.len(), 1);
    }

    #[test]
    fn transport_parses_aliases() {
        assert_eq!("raw".parse::<ClientTransport>(), Ok(ClientTransport::Raw));
        assert_eq!("json".parse::<ClientTransport>(), Ok(ClientTransport::Envelope));
        assert_eq!(
            "envelope".parse::<ClientTransport>(),
            Ok(ClientTransport::Envelope)
        );
        assert!("pcm".parse::<ClientTransport>().is_err());
        assert_eq!(ClientTransport::default(), ClientTransport::Raw);
    }
}
