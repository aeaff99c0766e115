//! Observable notification feed wired to the event dispatcher.
//!
//! [`NotificationStore`] turns every notifiable envelope into a
//! [`NotificationRecord`] via [`format::build_record`] and clears a job's
//! progress entry when that job completes or fails.

use std::sync::Arc;

use pulse_core::EventType;
use pulse_events::{EventDispatcher, EventEnvelope, Subscription};
use tokio::sync::watch;

use crate::feed::NotificationFeed;
use crate::format;
use crate::progress::ProgressTracker;
use crate::record::NotificationRecord;

/// Observable notification feed fed by dispatched events.
///
/// Every mutation goes through a `watch` channel; receivers from
/// [`subscribe`](Self::subscribe) wake only when the feed actually changed.
pub struct NotificationStore {
    feed: watch::Sender<NotificationFeed>,
    progress: Arc<ProgressTracker>,
}

impl NotificationStore {
    pub fn new(capacity: usize, progress: Arc<ProgressTracker>) -> Self {
        let (feed, _rx) = watch::channel(NotificationFeed::new(capacity));
        Self { feed, progress }
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.subscribe()
    }

    /// Copy of the current feed.
    pub fn snapshot(&self) -> NotificationFeed {
        self.feed.borrow().clone()
    }

    /// Records, newest first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.feed.borrow().notifications()
    }

    pub fn unread_count(&self) -> usize {
        self.feed.borrow().unread_count()
    }

    pub fn add_notification(&self, record: NotificationRecord) -> bool {
        self.feed.send_if_modified(|feed| feed.add_notification(record))
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        self.feed.send_if_modified(|feed| feed.mark_as_read(id))
    }

    pub fn mark_all_as_read(&self) -> bool {
        self.feed.send_if_modified(|feed| feed.mark_all_as_read())
    }

    pub fn remove_notification(&self, id: &str) -> Option<NotificationRecord> {
        let mut removed = None;
        self.feed.send_if_modified(|feed| {
            removed = feed.remove_notification(id);
            removed.is_some()
        });
        removed
    }

    pub fn clear_all(&self) -> bool {
        self.feed.send_if_modified(|feed| feed.clear_all())
    }

    /// Handle one dispatched envelope.
    ///
    /// Terminal job events clear that job's progress entry before the
    /// record is added.
    pub fn apply(&self, envelope: &EventEnvelope) {
        if matches!(
            envelope.event_type,
            EventType::JobCompleted | EventType::JobFailed
        ) {
            if let Some(job_id) = envelope.id_field("job_id") {
                self.progress.clear_progress(&job_id);
            }
        }

        let Some(record) = format::build_record(envelope) else {
            return;
        };

        let id = record.id.clone();
        if self.add_notification(record) {
            tracing::debug!(
                event_type = %envelope.event_type,
                notification_id = %id,
                "Notification added"
            );
        } else {
            tracing::debug!(notification_id = %id, "Duplicate notification ignored");
        }
    }

    /// Register a handler on `dispatcher` for every notifiable event type.
    pub fn attach(self: &Arc<Self>, dispatcher: &Arc<EventDispatcher>) -> Vec<Subscription> {
        format::notifiable_types()
            .into_iter()
            .map(|event_type| {
                let store = Arc::clone(self);
                dispatcher.subscribe(
                    event_type,
                    Arc::new(move |envelope: &EventEnvelope| store.apply(envelope)),
                )
            })
            .collect()
    }
}
