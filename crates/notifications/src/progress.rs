//! In-flight job progress keyed by job id.
//!
//! The tracker holds at most one entry per job. Entries are created or
//! replaced by `job_progress` events and removed when the job reaches a
//! terminal state (see [`NotificationStore::attach`](crate::NotificationStore::attach)).
//! Observers subscribe to a `watch` channel carrying the whole map.

use std::collections::HashMap;
use std::sync::Arc;

use pulse_core::types::JobId;
use pulse_core::EventType;
use pulse_events::{EventDispatcher, EventEnvelope, Subscription};
use serde::Serialize;
use tokio::sync::watch;

/// Status recorded when a progress event omits one.
pub const DEFAULT_STATUS: &str = "running";

/// Latest known progress of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub job_id: JobId,
    /// Percentage as reported, clamped into `0.0..=100.0`.
    pub progress: f64,
    pub status: String,
}

impl ProgressRecord {
    pub fn new(job_id: impl Into<JobId>, progress: f64, status: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: clamp_percent(progress),
            status: status.into(),
        }
    }
}

/// Clamp into `0.0..=100.0`. `NaN` is treated as 0.
fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

pub struct ProgressTracker {
    tx: watch::Sender<HashMap<JobId, ProgressRecord>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HashMap::new());
        Self { tx }
    }

    /// Insert or replace the entry for `job_id`.
    pub fn update_progress(&self, job_id: impl Into<JobId>, progress: f64, status: impl Into<String>) {
        let record = ProgressRecord::new(job_id, progress, status);
        self.tx.send_if_modified(|map| {
            if map.get(&record.job_id) == Some(&record) {
                return false;
            }
            map.insert(record.job_id.clone(), record);
            true
        });
    }

    /// Drop the entry for `job_id`. No-op when absent.
    pub fn clear_progress(&self, job_id: &str) {
        self.tx.send_if_modified(|map| map.remove(job_id).is_some());
    }

    pub fn clear_all(&self) {
        self.tx.send_if_modified(|map| {
            let changed = !map.is_empty();
            map.clear();
            changed
        });
    }

    pub fn get(&self, job_id: &str) -> Option<ProgressRecord> {
        self.tx.borrow().get(job_id).cloned()
    }

    /// Owned copy of every entry.
    pub fn snapshot(&self) -> HashMap<JobId, ProgressRecord> {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver notified after every change to the map.
    pub fn subscribe(&self) -> watch::Receiver<HashMap<JobId, ProgressRecord>> {
        self.tx.subscribe()
    }

    /// Apply one `job_progress` envelope. Envelopes without a usable
    /// `job_id` or `progress` are logged and ignored.
    pub fn apply(&self, envelope: &EventEnvelope) {
        let Some(job_id) = envelope.id_field("job_id") else {
            tracing::warn!(payload = ?envelope.payload, "Progress event without job_id");
            return;
        };
        let Some(progress) = envelope.f64_field("progress") else {
            tracing::warn!(job_id = %job_id, "Progress event without numeric progress");
            return;
        };
        let status = envelope.str_field("status").unwrap_or(DEFAULT_STATUS);

        tracing::debug!(job_id = %job_id, progress, status, "Job progress");
        self.update_progress(job_id, progress, status);
    }

    /// Register the `job_progress` handler on `dispatcher`.
    pub fn attach(self: &Arc<Self>, dispatcher: &Arc<EventDispatcher>) -> Subscription {
        let tracker = Arc::clone(self);
        dispatcher.subscribe(
            EventType::JobProgress,
            Arc::new(move |envelope: &EventEnvelope| tracker.apply(envelope)),
        )
    }
}
