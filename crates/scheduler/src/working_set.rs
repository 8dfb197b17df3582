//! Shared snapshot of the current events.
//!
//! Writers replace the whole list; readers take an `Arc` to the current list
//! and scan it without holding the lock, so a scan always sees one
//! consistent snapshot.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::warn;

use fixwatch_core::MaintenanceEvent;

#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    inner: Arc<RwLock<Arc<Vec<MaintenanceEvent>>>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Vec<MaintenanceEvent>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a fresh list. Repeated ids keep their first occurrence.
    /// Returns the number of events kept.
    pub fn replace(&self, events: Vec<MaintenanceEvent>) -> usize {
        let mut seen = HashSet::with_capacity(events.len());
        let mut unique = Vec::with_capacity(events.len());
        for event in events {
            if seen.insert(event.id.clone()) {
                unique.push(event);
            } else {
                warn!(event_id = %event.id, "duplicate event id in source, ignoring later copy");
            }
        }
        let count = unique.len();
        self.swap(unique);
        count
    }

    /// Insert or replace a single event, keeping list order.
    pub fn upsert(&self, event: MaintenanceEvent) {
        self.modify(|events| match events.iter().position(|e| e.id == event.id) {
            Some(idx) => events[idx] = event,
            None => events.push(event),
        });
    }

    pub fn remove(&self, id: &str) -> bool {
        self.modify(|events| {
            let before = events.len();
            events.retain(|e| e.id != id);
            events.len() != before
        })
    }

    pub fn get(&self, id: &str) -> Option<MaintenanceEvent> {
        self.snapshot().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn swap(&self, events: Vec<MaintenanceEvent>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(events);
    }

    /// Copy-on-write edit under the write lock.
    fn modify<R>(&self, f: impl FnOnce(&mut Vec<MaintenanceEvent>) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut events = guard.as_ref().clone();
        let out = f(&mut events);
        *guard = Arc::new(events);
        out
    }
}
