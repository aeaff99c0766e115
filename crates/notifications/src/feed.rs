//! Bounded, newest-first notification feed.
//!
//! [`NotificationFeed`] is plain data with synchronous, total operations;
//! a missing id is a no-op, never an error. After every mutation
//! `unread_count()` equals the number of records with `read == false`.

use std::collections::VecDeque;

use crate::record::NotificationRecord;

/// Records kept before the oldest is evicted.
pub const DEFAULT_FEED_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct NotificationFeed {
    capacity: usize,
    /// Front is newest.
    records: VecDeque<NotificationRecord>,
    unread_count: usize,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl NotificationFeed {
    /// An empty feed holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
            unread_count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    /// Records, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }

    /// Owned copy of the records, newest first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Prepend `record`, evicting the oldest records beyond capacity.
    ///
    /// Returns `false` (and changes nothing) when a record with the same
    /// id is already in the feed.
    pub fn add_notification(&mut self, record: NotificationRecord) -> bool {
        if self.get(&record.id).is_some() {
            return false;
        }

        self.records.push_front(record);
        self.records.truncate(self.capacity);
        self.recount();
        true
    }

    /// Mark one record read. Returns whether anything changed.
    pub fn mark_as_read(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.read => {
                record.read = true;
                self.unread_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Mark every record read. Returns whether anything changed.
    pub fn mark_all_as_read(&mut self) -> bool {
        let changed = self.unread_count > 0;
        for record in &mut self.records {
            record.read = true;
        }
        self.unread_count = 0;
        changed
    }

    /// Delete one record, returning it if it was present.
    pub fn remove_notification(&mut self, id: &str) -> Option<NotificationRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let removed = self.records.remove(index)?;
        if !removed.read {
            self.unread_count -= 1;
        }
        Some(removed)
    }

    /// Empty the feed. Returns whether anything was removed.
    pub fn clear_all(&mut self) -> bool {
        let changed = !self.records.is_empty();
        self.records.clear();
        self.unread_count = 0;
        changed
    }

    fn recount(&mut self) {
        self.unread_count = self.records.iter().filter(|r| !r.read).count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;
    use pulse_core::EventType;

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            event_type: EventType::SystemNotice,
            title: "System Notification".into(),
            message: format!("notice {id}"),
            severity: Severity::Info,
            payload: Default::default(),
            timestamp: chrono::Utc::now(),
            read: false,
            action_url: None,
        }
    }

    fn ids(feed: &NotificationFeed) -> Vec<&str> {
        feed.iter().map(|r| r.id.as_str()).collect()
    }

    fn actual_unread(feed: &NotificationFeed) -> usize {
        feed.iter().filter(|r| !r.read).count()
    }

    #[test]
    fn add_prepends_and_counts_unread() {
        let mut feed = NotificationFeed::new(10);
        assert!(feed.add_notification(record("a")));
        assert!(feed.add_notification(record("b")));

        assert_eq!(ids(&feed), vec!["b", "a"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn overflow_keeps_most_recent_capacity_records() {
        let mut feed = NotificationFeed::new(5);
        for i in 0..12 {
            feed.add_notification(record(&i.to_string()));
        }

        assert_eq!(feed.len(), 5);
        assert_eq!(ids(&feed), vec!["11", "10", "9", "8", "7"]);
        assert_eq!(feed.unread_count(), 5);
    }

    #[test]
    fn eviction_with_capacity_two() {
        let mut feed = NotificationFeed::new(2);
        feed.add_notification(record("A"));
        feed.add_notification(record("B"));
        feed.add_notification(record("C"));

        assert_eq!(ids(&feed), vec!["C", "B"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn evicting_a_read_record_keeps_counter() {
        let mut feed = NotificationFeed::new(2);
        feed.add_notification(record("A"));
        feed.mark_as_read("A");
        feed.add_notification(record("B"));
        feed.add_notification(record("C"));

        assert_eq!(ids(&feed), vec!["C", "B"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn duplicate_id_is_ignored() {
        let mut feed = NotificationFeed::new(5);
        feed.add_notification(record("a"));
        feed.mark_as_read("a");

        assert!(!feed.add_notification(record("a")));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn mark_as_read_is_idempotent() {
        let mut feed = NotificationFeed::new(5);
        feed.add_notification(record("a"));
        feed.add_notification(record("b"));

        assert!(feed.mark_as_read("a"));
        let once = (ids(&feed).join(","), feed.unread_count(), feed.get("a").unwrap().read);

        assert!(!feed.mark_as_read("a"));
        let twice = (ids(&feed).join(","), feed.unread_count(), feed.get("a").unwrap().read);

        assert_eq!(once, twice);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn missing_ids_are_noops() {
        let mut feed = NotificationFeed::new(5);
        feed.add_notification(record("a"));

        assert!(!feed.mark_as_read("zzz"));
        assert!(feed.remove_notification("zzz").is_none());
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn remove_adjusts_counter_only_for_unread() {
        let mut feed = NotificationFeed::new(5);
        feed.add_notification(record("a"));
        feed.add_notification(record("b"));
        feed.mark_as_read("a");

        feed.remove_notification("a");
        assert_eq!(feed.unread_count(), 1);

        feed.remove_notification("b");
        assert_eq!(feed.unread_count(), 0);
        assert!(feed.is_empty());
    }

    #[test]
    fn mark_all_and_clear_all() {
        let mut feed = NotificationFeed::new(5);
        for id in ["a", "b", "c"] {
            feed.add_notification(record(id));
        }

        assert!(feed.mark_all_as_read());
        assert_eq!(feed.unread_count(), 0);
        assert!(feed.iter().all(|r| r.read));
        assert!(!feed.mark_all_as_read());

        assert!(feed.clear_all());
        assert!(feed.is_empty());
        assert_eq!(feed.unread_count(), 0);
        assert!(feed.get("a").is_none());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut feed = NotificationFeed::new(0);
        feed.add_notification(record("a"));
        feed.add_notification(record("b"));
        assert_eq!(ids(&feed), vec!["b"]);
    }

    #[test]
    fn unread_counter_matches_records_after_every_operation() {
        // Deterministic pseudo-random operation mix.
        let mut feed = NotificationFeed::new(7);
        let mut seed: u64 = 0x5eed;
        let mut next = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for step in 0..2_000 {
            let id = (next() % 15).to_string();
            match next() % 5 {
                0 | 1 => {
                    feed.add_notification(record(&format!("{id}-{step}")));
                }
                2 => {
                    let target = feed.iter().nth(next() % 8).map(|r| r.id.clone());
                    feed.mark_as_read(target.as_deref().unwrap_or(&id));
                }
                3 => {
                    let target = feed.iter().nth(next() % 8).map(|r| r.id.clone());
                    feed.remove_notification(target.as_deref().unwrap_or(&id));
                }
                _ => {
                    if next() % 10 == 0 {
                        feed.clear_all();
                    } else {
                        feed.mark_all_as_read();
                    }
                }
            }

            assert_eq!(feed.unread_count(), actual_unread(&feed), "step {step}");
            assert!(feed.len() <= feed.capacity());
        }
    }
}
