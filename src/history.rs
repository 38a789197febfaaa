//! Bounded history of scored ticks
//!
//! Append-only from the pipeline's point of view; when the capacity is exceeded the
//! oldest entries are dropped first.

use std::collections::VecDeque;

use crate::types::HistoryEntry;

/// Default number of entries retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStore {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Wrap previously persisted entries, trimming to the newest `capacity`
    pub fn from_entries(capacity: usize, entries: Vec<HistoryEntry>) -> Self {
        let mut store = Self::new(capacity);
        store.entries = entries.into();
        store.trim();
        store
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        self.trim();
    }

    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first
    pub fn latest(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn into_vec(self) -> Vec<HistoryEntry> {
        self.entries.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(i: i64) -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.timestamp_millis_opt(i * 60_000).unwrap(),
            distraction_score: 0.1,
            scroll_velocity: i as f64,
            is_hovering_top: false,
            tab_switch_count: 0,
            avg_typing_interval: 0.0,
            backspace_count: 0,
        }
    }

    #[test]
    fn test_retains_last_m_in_order() {
        let m = 1000;
        let k = 37;
        let mut store = HistoryStore::new(m);
        for i in 0..(m + k) as i64 {
            store.append(entry(i));
            assert!(store.len() <= m);
        }

        let kept = store.into_vec();
        assert_eq!(kept.len(), m);
        for (offset, e) in kept.iter().enumerate() {
            assert_eq!(e.scroll_velocity, (offset + k) as f64);
        }
    }

    #[test]
    fn test_from_entries_trims() {
        let entries: Vec<_> = (0..10).map(entry).collect();
        let store = HistoryStore::from_entries(4, entries);
        let kept: Vec<f64> = store.iter().map(|e| e.scroll_velocity).collect();
        assert_eq!(kept, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_latest() {
        let mut store = HistoryStore::new(10);
        for i in 0..3 {
            store.append(entry(i));
        }
        assert_eq!(store.latest(5).len(), 3);
        let last_two: Vec<f64> = store.latest(2).iter().map(|e| e.scroll_velocity).collect();
        assert_eq!(last_two, vec![1.0, 2.0]);
    }
}
