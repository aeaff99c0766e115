//! Event-type tags carried in the `type` field of notification frames.
//!
//! The wire uses open strings; inside the client every tag is an
//! [`EventType`] so that dispatch on known kinds is exhaustive. Tags the
//! client does not recognise survive as [`EventType::Other`] and still
//! reach wildcard subscribers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress update for a running analysis job.
pub const MSG_TYPE_JOB_PROGRESS: &str = "job_progress";

/// Analysis job finished successfully.
pub const MSG_TYPE_JOB_COMPLETED: &str = "job_completed";

/// Analysis job failed.
pub const MSG_TYPE_JOB_FAILED: &str = "job_failed";

/// A generated report is available.
pub const MSG_TYPE_REPORT_READY: &str = "report_ready";

/// Operator-authored system notice (maintenance, incidents).
pub const MSG_TYPE_SYSTEM_NOTICE: &str = "system_notification";

/// The account's billing subscription changed.
pub const MSG_TYPE_SUBSCRIPTION_CHANGED: &str = "subscription_updated";

/// A billing charge failed.
pub const MSG_TYPE_PAYMENT_FAILED: &str = "payment_failed";

/// Error channel, both server-sent and locally raised connection errors.
pub const MSG_TYPE_ERROR: &str = "error";

/// Value of the `source` payload field on `error` envelopes raised by the
/// client's own connection handling rather than sent by the server.
pub const ERROR_SOURCE_CONNECTION: &str = "connection";

/// Client heartbeat.
pub const MSG_TYPE_PING: &str = "ping";

/// Server heartbeat acknowledgement. Never dispatched.
pub const MSG_TYPE_PONG: &str = "pong";

/// A typed event tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    JobProgress,
    JobCompleted,
    JobFailed,
    ReportReady,
    SystemNotice,
    SubscriptionChanged,
    PaymentFailed,
    Error,
    Ping,
    Pong,
    /// Any tag not listed above, kept verbatim.
    Other(String),
}

impl EventType {
    /// The wire tag for this event type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::JobProgress => MSG_TYPE_JOB_PROGRESS,
            Self::JobCompleted => MSG_TYPE_JOB_COMPLETED,
            Self::JobFailed => MSG_TYPE_JOB_FAILED,
            Self::ReportReady => MSG_TYPE_REPORT_READY,
            Self::SystemNotice => MSG_TYPE_SYSTEM_NOTICE,
            Self::SubscriptionChanged => MSG_TYPE_SUBSCRIPTION_CHANGED,
            Self::PaymentFailed => MSG_TYPE_PAYMENT_FAILED,
            Self::Error => MSG_TYPE_ERROR,
            Self::Ping => MSG_TYPE_PING,
            Self::Pong => MSG_TYPE_PONG,
            Self::Other(tag) => tag,
        }
    }

    /// Server reply to a heartbeat `ping`; never reaches subscribers.
    /// `ping` itself is outbound-only and dispatched like any other tag
    /// if a server ever sends one.
    pub fn is_heartbeat_reply(&self) -> bool {
        matches!(self, Self::Pong)
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        match tag {
            MSG_TYPE_JOB_PROGRESS => Self::JobProgress,
            MSG_TYPE_JOB_COMPLETED => Self::JobCompleted,
            MSG_TYPE_JOB_FAILED => Self::JobFailed,
            MSG_TYPE_REPORT_READY => Self::ReportReady,
            MSG_TYPE_SYSTEM_NOTICE => Self::SystemNotice,
            MSG_TYPE_SUBSCRIPTION_CHANGED => Self::SubscriptionChanged,
            MSG_TYPE_PAYMENT_FAILED => Self::PaymentFailed,
            MSG_TYPE_ERROR => Self::Error,
            MSG_TYPE_PING => Self::Ping,
            MSG_TYPE_PONG => Self::Pong,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
