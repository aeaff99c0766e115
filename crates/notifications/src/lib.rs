//! Client-side notification state derived from realtime events.
//!
//! - [`NotificationFeed`] -- bounded, newest-first feed with an unread
//!   counter that always matches the records.
//! - [`NotificationStore`] -- observable wrapper that turns dispatched
//!   envelopes into [`NotificationRecord`]s.
//! - [`ProgressTracker`] -- keyed map of in-flight job progress.
//! - [`format`] -- the event-to-record mapping rules.

pub mod feed;
pub mod format;
pub mod progress;
pub mod record;
pub mod store;

pub use feed::{NotificationFeed, DEFAULT_FEED_CAPACITY};
pub use progress::{ProgressRecord, ProgressTracker};
pub use record::{NotificationRecord, Severity};
pub use store::NotificationStore;
