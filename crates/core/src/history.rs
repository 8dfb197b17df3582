//! Bounded, deduplicated maintenance history for an asset.
//!
//! Pipeline: keep `Completed` entries, stable-dedup by id (first occurrence
//! wins), drop the target event itself, optionally sort most-recent-first,
//! then truncate to `limit`.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{EventStatus, MaintenanceEvent};

/// Default number of past services shown for an asset.
pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// Ordering applied before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    /// Sort by `start` descending (stable for equal starts).
    #[default]
    RecentFirst,
    /// Keep whatever order survives filtering (legacy behaviour).
    Input,
}

impl FromStr for HistoryOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent_first" | "recent-first" | "recent" => Ok(HistoryOrder::RecentFirst),
            "input" | "legacy" => Ok(HistoryOrder::Input),
            other => Err(format!("unknown history order: {other}")),
        }
    }
}

/// Pure history view builder. Holds configuration only, so one instance can
/// serve concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryAggregator {
    limit: usize,
    order: HistoryOrder,
}

impl Default for HistoryAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT, HistoryOrder::default())
    }
}

impl HistoryAggregator {
    pub fn new(limit: usize, order: HistoryOrder) -> Self {
        Self { limit, order }
    }

    /// Aggregator reproducing the unsorted truncation of the legacy UI.
    pub fn legacy() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT, HistoryOrder::Input)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn order(&self) -> HistoryOrder {
        self.order
    }

    /// Relevant completed past services for `target`, drawn from `candidates`.
    ///
    /// Returns an empty vector when nothing qualifies.
    pub fn history(
        &self,
        target: &MaintenanceEvent,
        candidates: &[MaintenanceEvent],
    ) -> Vec<MaintenanceEvent> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries: Vec<&MaintenanceEvent> = Vec::new();
        for event in candidates {
            if event.status() != EventStatus::Completed {
                continue;
            }
            if !seen.insert(event.id.as_str()) {
                continue;
            }
            if event.id != target.id {
                entries.push(event);
            }
        }

        if self.order == HistoryOrder::RecentFirst {
            // sort_by is stable, so equal starts keep input order
            entries.sort_by(|a, b| b.start().cmp(&a.start()));
        }

        entries.into_iter().take(self.limit).cloned().collect()
    }

    /// Like [`history`](Self::history), restricted to events on the target's asset.
    ///
    /// A target without an asset reference has no history.
    pub fn history_for_asset(
        &self,
        target: &MaintenanceEvent,
        all_events: &[MaintenanceEvent],
    ) -> Vec<MaintenanceEvent> {
        let Some(asset_id) = target.asset_id.as_deref() else {
            return Vec::new();
        };
        let same_asset: Vec<MaintenanceEvent> = all_events
            .iter()
            .filter(|e| e.asset_id.as_deref() == Some(asset_id))
            .cloned()
            .collect();
        self.history(target, &same_asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap()
    }

    fn ev(id: &str, status: EventStatus, days: i64) -> MaintenanceEvent {
        let start = base() + Duration::days(days);
        MaintenanceEvent::new(id, start, start + Duration::hours(2), status).unwrap()
    }

    fn ids(events: &[MaintenanceEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn mixed_candidates_collapse_to_single_entry() {
        let target = ev("target", EventStatus::Completed, 0);
        let candidates = vec![
            ev("H1", EventStatus::Completed, 1),
            ev("H1", EventStatus::Completed, 2),
            ev("target", EventStatus::Completed, 0),
            ev("H2", EventStatus::Scheduled, 3),
        ];
        for agg in [HistoryAggregator::default(), HistoryAggregator::legacy()] {
            assert_eq!(ids(&agg.history(&target, &candidates)), vec!["H1"]);
        }
    }

    #[test]
    fn duplicate_keeps_first_by_input_order() {
        let target = ev("target", EventStatus::Scheduled, 0);
        let first = ev("H1", EventStatus::Completed, 1).with_notes("first");
        let second = ev("H1", EventStatus::Completed, 5).with_notes("second");
        let out = HistoryAggregator::default().history(&target, &[first, second]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].notes.as_deref(), Some("first"));
    }

    #[test]
    fn truncates_to_three() {
        let target = ev("target", EventStatus::Scheduled, 0);
        let candidates: Vec<_> = (1..=5)
            .map(|i| ev(&format!("H{i}"), EventStatus::Completed, i))
            .collect();
        assert_eq!(HistoryAggregator::default().history(&target, &candidates).len(), 3);
        assert_eq!(HistoryAggregator::legacy().history(&target, &candidates).len(), 3);
    }

    #[test]
    fn recent_first_sorts_before_truncating() {
        let target = ev("target", EventStatus::Scheduled, 0);
        let candidates = vec![
            ev("old", EventStatus::Completed, -30),
            ev("newest", EventStatus::Completed, -1),
            ev("oldest", EventStatus::Completed, -60),
            ev("mid", EventStatus::Completed, -10),
        ];
        let out = HistoryAggregator::default().history(&target, &candidates);
        assert_eq!(ids(&out), vec!["newest", "mid", "old"]);
    }

    #[test]
    fn legacy_order_truncates_unsorted() {
        let target = ev("target", EventStatus::Scheduled, 0);
        let candidates = vec![
            ev("old", EventStatus::Completed, -30),
            ev("newest", EventStatus::Completed, -1),
            ev("oldest", EventStatus::Completed, -60),
            ev("mid", EventStatus::Completed, -10),
        ];
        let out = HistoryAggregator::legacy().history(&target, &candidates);
        assert_eq!(ids(&out), vec!["old", "newest", "oldest"]);
    }

    #[test]
    fn never_contains_target() {
        let target = ev("T", EventStatus::Completed, 0);
        let candidates = vec![
            ev("T", EventStatus::Completed, -1),
            ev("A", EventStatus::Completed, -2),
            ev("T", EventStatus::Completed, -3),
        ];
        let out = HistoryAggregator::default().history(&target, &candidates);
        assert!(out.iter().all(|e| e.id != "T"));
        assert_eq!(ids(&out), vec!["A"]);
    }

    #[test]
    fn empty_candidates_yield_empty_history() {
        let target = ev("T", EventStatus::Scheduled, 0);
        assert!(HistoryAggregator::default().history(&target, &[]).is_empty());
    }

    #[test]
    fn history_for_asset_ignores_other_assets() {
        let target = ev("T", EventStatus::Scheduled, 0).with_asset("ac-1");
        let all = vec![
            ev("A", EventStatus::Completed, -1).with_asset("ac-1"),
            ev("B", EventStatus::Completed, -2).with_asset("ac-2"),
            ev("C", EventStatus::Completed, -3),
        ];
        let out = HistoryAggregator::default().history_for_asset(&target, &all);
        assert_eq!(ids(&out), vec!["A"]);
    }

    #[test]
    fn history_for_asset_without_asset_is_empty() {
        let target = ev("T", EventStatus::Scheduled, 0);
        let all = vec![ev("A", EventStatus::Completed, -1).with_asset("ac-1")];
        assert!(HistoryAggregator::default().history_for_asset(&target, &all).is_empty());
    }

    #[test]
    fn history_order_parses() {
        assert_eq!("input".parse::<HistoryOrder>().unwrap(), HistoryOrder::Input);
        assert_eq!("recent_first".parse::<HistoryOrder>().unwrap(), HistoryOrder::RecentFirst);
        assert!("sideways".parse::<HistoryOrder>().is_err());
    }
}
