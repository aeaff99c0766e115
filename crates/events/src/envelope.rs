//! Decoded representation of one inbound notification frame.
//!
//! The server sends JSON text frames shaped like
//! `{"type": "<tag>", "payload": {...}, "timestamp": "...", "notification_id": "..."}`.
//! Only `type` is required; a missing or `null` payload decodes to an
//! empty object.

use pulse_core::EventType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A typed event received from (or synthesised for) the notification
/// stream.
///
/// Constructed via [`EventEnvelope::new`] and enriched with
/// [`with_payload`](EventEnvelope::with_payload),
/// [`with_timestamp`](EventEnvelope::with_timestamp) and
/// [`with_id`](EventEnvelope::with_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Event-specific fields. Opaque to the transport.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Map<String, Value>,

    /// Server-side emission time, RFC 3339 when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Server-assigned notification identifier.
    #[serde(
        default,
        rename = "notification_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
}

impl EventEnvelope {
    /// Create an envelope with an empty payload.
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            payload: Map::new(),
            timestamp: None,
            id: None,
        }
    }

    /// Set the payload. Non-object values are ignored.
    pub fn with_payload(mut self, payload: Value) -> Self {
        if let Value::Object(map) = payload {
            self.payload = map;
        }
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Raw payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Payload field as a non-empty string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Payload field rendered as an identifier: strings verbatim,
    /// integers in decimal.
    pub fn id_field(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        }
    }

    /// Payload field as a float, accepting numeric strings.
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.payload.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Parse one text frame into an envelope.
///
/// Returns `Err` for malformed JSON, a missing `type`, or a payload that
/// is not an object. Callers log the failure and drop the frame.
pub fn parse_envelope(text: &str) -> Result<EventEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_frame() {
        let json = r#"{"type":"job_completed","payload":{"job_id":"a","platform":"twitter"},"timestamp":"2024-05-01T10:00:00Z","notification_id":"n-1"}"#;
        let env = parse_envelope(json).unwrap();
        assert_eq!(env.event_type, EventType::JobCompleted);
        assert_eq!(env.str_field("job_id"), Some("a"));
        assert_eq!(env.timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(env.id.as_deref(), Some("n-1"));
    }

    #[test]
    fn parse_minimal_frame() {
        let env = parse_envelope(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(env.event_type, EventType::Pong);
        assert!(env.payload.is_empty());
        assert!(env.timestamp.is_none());
        assert!(env.id.is_none());
    }

    #[test]
    fn null_payload_is_empty() {
        let env = parse_envelope(r#"{"type":"error","payload":null}"#).unwrap();
        assert!(env.payload.is_empty());
    }

    #[test]
    fn unknown_type_is_kept() {
        let env = parse_envelope(r#"{"type":"quota_warning","payload":{}}"#).unwrap();
        assert_eq!(env.event_type, EventType::Other("quota_warning".into()));
    }

    #[test]
    fn missing_type_is_an_error() {
        assert!(parse_envelope(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn non_object_payload_is_an_error() {
        assert!(parse_envelope(r#"{"type":"error","payload":[1,2]}"#).is_err());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_envelope("not json at all").is_err());
    }

    #[test]
    fn id_field_accepts_numbers() {
        let env = EventEnvelope::new(EventType::JobProgress)
            .with_payload(serde_json::json!({"job_id": 42, "progress": "37.5"}));
        assert_eq!(env.id_field("job_id").as_deref(), Some("42"));
        assert_eq!(env.f64_field("progress"), Some(37.5));
    }

    #[test]
    fn serialises_with_wire_names() {
        let env = EventEnvelope::new(EventType::SystemNotice).with_id("n-9");
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "system_notification");
        assert_eq!(value["notification_id"], "n-9");
        assert!(value.get("timestamp").is_none());
    }
}
