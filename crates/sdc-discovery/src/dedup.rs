// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Duplicate-suppression table for discovery messages arriving over
//! multicast and unicast alike: a relay or multi-homed host can deliver
//! the same `Hello`/`Bye`/`ProbeMatches` more than once.
//!
//! Keyed on `(AppSequence, message id)` per the WS-Discovery matching
//! rule: `AppSequence` carries the sender's instance id and a
//! monotonic announce counter, so a duplicate delivery of the same
//! announcement arrives with the identical pair. Entries are retained
//! in a time-windowed table and swept on lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::message::AppSequence;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

impl DedupTable {
    pub const DEFAULT_WINDOW: Duration = DEFAULT_WINDOW;
}

/// Tracks which `(AppSequence, message_id)` pairs have already been
/// processed within a sliding time window, so a duplicate delivery of
/// the same discovery message is dropped rather than re-surfaced to the
/// caller.
pub struct DedupTable {
    seen: HashMap<(AppSequence, Arc<str>), Duration>,
    max_entries: usize,
    window: Duration,
}

impl DedupTable {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_MAX_ENTRIES, DEFAULT_WINDOW)
    }

    pub fn with_window(max_entries: usize, window: Duration) -> Self {
        Self {
            seen: HashMap::new(),
            max_entries,
            window,
        }
    }

    /// Returns `true` if `(app_sequence, message_id)` was already observed
    /// within the dedup window as of `now`; otherwise records it and
    /// returns `false`. Expired entries are swept on every call.
    pub fn is_duplicate(&mut self, app_sequence: AppSequence, message_id: &str, now: Duration) -> bool {
        self.seen.retain(|_, seen_at| now.saturating_sub(*seen_at) < self.window);

        let key = (app_sequence, Arc::from(message_id));
        if self.seen.contains_key(&key) {
            return true;
        }
        if self.seen.len() < self.max_entries {
            self.seen.insert(key, now);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl Default for DedupTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_not_a_duplicate() {
        let mut table = DedupTable::new();
        assert!(!table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn repeat_within_window_is_a_duplicate() {
        let mut table = DedupTable::new();
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        assert!(table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn different_message_id_same_app_sequence_is_not_a_duplicate() {
        let mut table = DedupTable::new();
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        assert!(!table.is_duplicate(AppSequence::first(1), "urn:uuid:m2", Duration::from_secs(0)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn different_app_sequence_same_message_id_is_not_a_duplicate() {
        let mut table = DedupTable::new();
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        assert!(!table.is_duplicate(AppSequence::first(1).next(), "urn:uuid:m1", Duration::from_secs(0)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn entry_expires_after_window_elapses() {
        let mut table = DedupTable::with_window(100, Duration::from_secs(5));
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        assert!(!table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(6)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn max_entries_caps_table_growth() {
        let mut table = DedupTable::with_window(2, Duration::from_secs(300));
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m2", Duration::from_secs(0));
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m3", Duration::from_secs(0));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn clear_empties_the_table() {
        let mut table = DedupTable::new();
        table.is_duplicate(AppSequence::first(1), "urn:uuid:m1", Duration::from_secs(0));
        table.clear();
        assert!(table.is_empty());
    }
}
