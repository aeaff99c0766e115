use pulse_core::types::Timestamp;
use pulse_core::EventType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Parse a payload-supplied severity. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" => Some(Self::Success),
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One entry in the notification feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Server `notification_id` when supplied, otherwise a local UUID.
    pub id: String,
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// The originating event payload, untouched.
    pub payload: Map<String, Value>,
    pub timestamp: Timestamp,
    pub read: bool,
    /// In-app route or external URL the notification links to.
    pub action_url: Option<String>,
}
