//! Upcoming-event detection.
//!
//! An event is due when it is still `Scheduled`, starts strictly after `now`,
//! starts no later than `now + lookahead`, and has not been alerted yet.
//! Alerting is at-most-once: an event is marked fired as soon as its
//! dispatch attempt returns, whatever the outcome.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use fixwatch_core::{EventStatus, MaintenanceEvent};
use fixwatch_notify::{DispatchOutcome, DispatchReport, NotificationDispatcher};

use crate::dedup::NotificationDeduper;

/// Default lookahead window.
pub const DEFAULT_LOOKAHEAD_MINUTES: i64 = 60;

/// What one scan did.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Events that matched the window when the scan started.
    pub due: usize,
    /// One entry per dispatch attempt, in working-set order.
    pub dispatched: Vec<DispatchReport>,
    /// Due events left unsent because the scan was stopped.
    pub interrupted: usize,
}

impl ScanReport {
    pub fn delivered(&self) -> usize {
        self.dispatched
            .iter()
            .filter(|r| matches!(r.outcome, DispatchOutcome::Delivered | DispatchOutcome::Partial))
            .count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpcomingEventScanner {
    lookahead: Duration,
}

impl Default for UpcomingEventScanner {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_LOOKAHEAD_MINUTES))
    }
}

impl UpcomingEventScanner {
    /// A negative lookahead is treated as zero.
    pub fn new(lookahead: Duration) -> Self {
        Self {
            lookahead: lookahead.max(Duration::zero()),
        }
    }

    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    /// Window and status test, ignoring dedup state.
    ///
    /// The window is `(now, now + lookahead]`: an event starting exactly at
    /// `now` is already underway and is not alerted. When `now + lookahead`
    /// is past the representable range the window has no upper edge.
    pub fn in_window(&self, event: &MaintenanceEvent, now: DateTime<Utc>) -> bool {
        if event.status() != EventStatus::Scheduled || event.start() <= now {
            return false;
        }
        match now.checked_add_signed(self.lookahead) {
            Some(edge) => event.start() <= edge,
            None => true,
        }
    }

    /// Events due for an alert, in the order they appear in `events`.
    pub fn select_due<'a>(
        &self,
        events: &'a [MaintenanceEvent],
        now: DateTime<Utc>,
        deduper: &NotificationDeduper,
    ) -> Vec<&'a MaintenanceEvent> {
        events
            .iter()
            .filter(|e| self.in_window(e, now) && !deduper.has_fired(&e.id))
            .collect()
    }

    /// Dispatch every due event once and record it in `deduper`.
    pub async fn scan(
        &self,
        events: &[MaintenanceEvent],
        now: DateTime<Utc>,
        deduper: &mut NotificationDeduper,
        dispatcher: &NotificationDispatcher,
    ) -> ScanReport {
        self.scan_until(events, now, deduper, dispatcher, || false).await
    }

    /// Like [`scan`](Self::scan), but checks `stopped` before each dispatch
    /// and leaves the remaining due events untouched once it returns `true`.
    pub async fn scan_until<F>(
        &self,
        events: &[MaintenanceEvent],
        now: DateTime<Utc>,
        deduper: &mut NotificationDeduper,
        dispatcher: &NotificationDispatcher,
        stopped: F,
    ) -> ScanReport
    where
        F: Fn() -> bool,
    {
        let due = self.select_due(events, now, deduper);
        let mut report = ScanReport {
            due: due.len(),
            ..ScanReport::default()
        };

        for (idx, event) in due.iter().enumerate() {
            if stopped() {
                report.interrupted = due.len() - idx;
                debug!(remaining = report.interrupted, "scan stopped before dispatch");
                break;
            }
            // A snapshot may repeat an id; the first copy wins.
            if deduper.has_fired(&event.id) {
                continue;
            }

            let outcome = dispatcher.dispatch(event).await;
            deduper.mark_fired_until(&event.id, event.end());
            info!(
                event_id = %event.id,
                start = %event.start(),
                outcome = ?outcome.outcome,
                "upcoming event alerted"
            );
            report.dispatched.push(outcome);
        }

        report
    }
}
