//! Event-to-notification mapping.
//!
//! Titles come from a static table keyed by event type. Messages are
//! formatted per type from well-known payload fields; when none of those
//! fields are present the payload's own `message` is used, then a static
//! default. Severity is fixed per type except for system notices, whose
//! payload may carry its own.

use chrono::{DateTime, Utc};
use pulse_core::event_types::ERROR_SOURCE_CONNECTION;
use pulse_core::EventType;
use pulse_events::EventEnvelope;
use serde_json::Value;

use crate::record::{NotificationRecord, Severity};

/// In-app route of the billing page.
pub const BILLING_ROUTE: &str = "/billing";

/// Event types that produce a feed entry.
pub fn notifiable_types() -> [EventType; 7] {
    [
        EventType::JobCompleted,
        EventType::JobFailed,
        EventType::ReportReady,
        EventType::SystemNotice,
        EventType::SubscriptionChanged,
        EventType::PaymentFailed,
        EventType::Error,
    ]
}

/// Static title per event type.
pub fn title_for(event_type: &EventType) -> &'static str {
    match event_type {
        EventType::JobCompleted => "Analysis Complete",
        EventType::JobFailed => "Analysis Failed",
        EventType::ReportReady => "Report Ready",
        EventType::SystemNotice => "System Notification",
        EventType::SubscriptionChanged => "Subscription Updated",
        EventType::PaymentFailed => "Payment Failed",
        EventType::Error => "Error",
        _ => "Notification",
    }
}

/// Title for `envelope`: the static per-type title, except that errors
/// raised by the client's own connection handling read "Connection Error".
pub fn title_of(envelope: &EventEnvelope) -> &'static str {
    match envelope.event_type {
        EventType::Error if envelope.str_field("source") == Some(ERROR_SOURCE_CONNECTION) => {
            "Connection Error"
        }
        _ => title_for(&envelope.event_type),
    }
}

fn default_message(event_type: &EventType) -> &'static str {
    match event_type {
        EventType::JobCompleted => "Your analysis has finished.",
        EventType::JobFailed => "Your analysis could not be completed.",
        EventType::ReportReady => "Your report is ready to view.",
        EventType::SystemNotice => "A new system notice was posted.",
        EventType::SubscriptionChanged => "Your subscription has changed.",
        EventType::PaymentFailed => "A recent payment failed. Please update your billing details.",
        EventType::Error => "An unexpected error occurred.",
        _ => "You have a new notification.",
    }
}

/// Human-readable message for `envelope`.
pub fn message_for(envelope: &EventEnvelope) -> String {
    let specific = match envelope.event_type {
        EventType::JobCompleted => job_completed_message(envelope),
        EventType::JobFailed => job_failed_message(envelope),
        EventType::ReportReady => envelope
            .str_field("report_name")
            .or_else(|| envelope.str_field("title"))
            .map(|name| format!("Your report \"{name}\" is ready to view")),
        EventType::SubscriptionChanged => subscription_message(envelope),
        EventType::PaymentFailed => payment_failed_message(envelope),
        _ => None,
    };

    specific
        .or_else(|| envelope.str_field("message").map(str::to_string))
        .unwrap_or_else(|| default_message(&envelope.event_type).to_string())
}

/// Severity for `envelope`; a valid payload `severity` wins for system
/// notices.
pub fn severity_for(envelope: &EventEnvelope) -> Severity {
    match envelope.event_type {
        EventType::JobCompleted | EventType::ReportReady => Severity::Success,
        EventType::SystemNotice => envelope
            .str_field("severity")
            .and_then(Severity::parse)
            .unwrap_or(Severity::Info),
        EventType::JobFailed | EventType::PaymentFailed | EventType::Error => Severity::Error,
        _ => Severity::Info,
    }
}

/// Navigation target, for types that have one.
pub fn action_url_for(envelope: &EventEnvelope) -> Option<String> {
    match envelope.event_type {
        EventType::JobCompleted | EventType::JobFailed => envelope
            .id_field("job_id")
            .map(|job_id| job_detail_route(&job_id)),
        EventType::ReportReady => envelope
            .str_field("download_url")
            .map(str::to_string)
            .or_else(|| {
                envelope
                    .id_field("report_id")
                    .map(|id| format!("/reports/{id}"))
            }),
        EventType::PaymentFailed => Some(BILLING_ROUTE.to_string()),
        _ => None,
    }
}

/// In-app route of a job's detail page.
pub fn job_detail_route(job_id: &str) -> String {
    format!("/analyses/{job_id}")
}

/// Build the feed record for `envelope`, or `None` for types that do not
/// produce notifications.
pub fn build_record(envelope: &EventEnvelope) -> Option<NotificationRecord> {
    if !notifiable_types().contains(&envelope.event_type) {
        return None;
    }

    Some(NotificationRecord {
        id: envelope
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        event_type: envelope.event_type.clone(),
        title: title_of(envelope).to_string(),
        message: message_for(envelope),
        severity: severity_for(envelope),
        payload: envelope.payload.clone(),
        timestamp: parse_timestamp(envelope.timestamp.as_deref()),
        read: false,
        action_url: action_url_for(envelope),
    })
}

/// RFC 3339 timestamp from the envelope, or now.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

// ---- per-type message rules ----

fn job_completed_message(envelope: &EventEnvelope) -> Option<String> {
    let platform = envelope.str_field("platform");
    let items = envelope
        .f64_field("total_items")
        .or_else(|| envelope.f64_field("items_count"));
    let rate = envelope.f64_field("positive_rate");

    if platform.is_none() && items.is_none() && rate.is_none() {
        return None;
    }

    let mut message = match platform {
        Some(p) => format!("{} analysis complete", capitalize(p)),
        None => "Analysis complete".to_string(),
    };
    let mut details = Vec::new();
    if let Some(n) = items {
        details.push(format!("{} items analyzed", format_number(n)));
    }
    if let Some(r) = rate {
        details.push(format!("{}% positive", format_number(r)));
    }
    if !details.is_empty() {
        message.push_str(": ");
        message.push_str(&details.join(", "));
    }
    Some(message)
}

fn job_failed_message(envelope: &EventEnvelope) -> Option<String> {
    let platform = envelope.str_field("platform");
    let error = envelope.str_field("error");
    match (platform, error) {
        (None, None) => None,
        (Some(p), Some(e)) => Some(format!("{} analysis failed: {e}", capitalize(p))),
        (Some(p), None) => Some(format!("{} analysis failed", capitalize(p))),
        (None, Some(e)) => Some(format!("Analysis failed: {e}")),
    }
}

fn subscription_message(envelope: &EventEnvelope) -> Option<String> {
    let plan = envelope
        .str_field("plan")
        .or_else(|| envelope.str_field("plan_name"));
    let status = envelope.str_field("status");
    match (plan, status) {
        (Some(plan), Some(status)) => Some(format!("Your plan is now {plan} ({status})")),
        (Some(plan), None) => Some(format!("Your plan is now {plan}")),
        (None, Some(status)) => Some(format!("Your subscription is now {status}")),
        (None, None) => None,
    }
}

fn payment_failed_message(envelope: &EventEnvelope) -> Option<String> {
    let amount = envelope.field("amount").and_then(|v| match v {
        Value::Number(n) => n.as_f64().map(|a| format!("{a:.2}")),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })?;
    let mut message = match envelope.str_field("currency") {
        Some(currency) => format!("Payment of {amount} {} failed", currency.to_uppercase()),
        None => format!("Payment of {amount} failed"),
    };
    if let Some(reason) = envelope.str_field("reason") {
        message.push_str(": ");
        message.push_str(reason);
    }
    Some(message)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whole numbers without a fraction, others with one decimal.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n:.1}")
    }
}
