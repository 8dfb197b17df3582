//! At-most-once record of which events have already been alerted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Set of alerted event ids, giving at-most-once delivery per event.
///
/// Entries live for the process lifetime unless they carry an expiry (the
/// event's `end`), in which case [`evict_expired`](Self::evict_expired)
/// drops them once that instant has passed. An event whose `end` is in the
/// past can no longer fall inside the lookahead window, so eviction never
/// causes a repeat alert.
#[derive(Debug, Default)]
pub struct NotificationDeduper {
    fired: HashMap<String, Option<DateTime<Utc>>>,
}

impl NotificationDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fired(&self, id: &str) -> bool {
        self.fired.contains_key(id)
    }

    /// Record an alert with no expiry. Marking twice is a no-op.
    pub fn mark_fired(&mut self, id: &str) {
        if !self.fired.contains_key(id) {
            self.fired.insert(id.to_string(), None);
        }
    }

    /// Record an alert that may be forgotten once `expires_at` has passed.
    ///
    /// An existing entry keeps the later of the two expiries; an entry
    /// without expiry stays permanent.
    pub fn mark_fired_until(&mut self, id: &str, expires_at: DateTime<Utc>) {
        match self.fired.get_mut(id) {
            Some(Some(existing)) => {
                if expires_at > *existing {
                    *existing = expires_at;
                }
            }
            Some(None) => {}
            None => {
                self.fired.insert(id.to_string(), Some(expires_at));
            }
        }
    }

    /// Drop entries whose expiry is strictly before `now`. Returns how many
    /// were removed.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.fired.len();
        self.fired
            .retain(|_, expiry| expiry.map_or(true, |end| end >= now));
        before - self.fired.len()
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}
