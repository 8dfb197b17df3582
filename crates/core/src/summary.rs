//! Dashboard aggregates over the event working set.

use chrono::{Datelike, Month, Weekday};
use serde::Serialize;

use crate::event::{EventStatus, MaintenanceEvent};
use crate::time::DisplayZone;

/// Event counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub scheduled: usize,
    pub completed: usize,
    pub canceled: usize,
}

impl StatusTotals {
    pub fn from_events(events: &[MaintenanceEvent]) -> Self {
        let mut totals = Self::default();
        for event in events {
            match event.status() {
                EventStatus::Scheduled => totals.scheduled += 1,
                EventStatus::Completed => totals.completed += 1,
                EventStatus::Canceled => totals.canceled += 1,
            }
        }
        totals
    }

    pub fn total(&self) -> usize {
        self.scheduled + self.completed + self.canceled
    }
}

/// One chart bucket: a label and how many events fell into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
}

/// Events per calendar month of their start, January through December.
///
/// Months are taken in `zone`; years are folded together.
pub fn monthly_counts(events: &[MaintenanceEvent], zone: DisplayZone) -> Vec<Bucket> {
    let mut counts = [0usize; 12];
    for event in events {
        let month0 = zone.localize(event.start()).month0() as usize;
        counts[month0] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| Bucket {
            label: Month::try_from(i as u8 + 1)
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
            count,
        })
        .collect()
}

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Events assigned to `technician_id`, counted per weekday of their start
/// (Sunday first).
pub fn assigned_by_weekday(
    events: &[MaintenanceEvent],
    technician_id: &str,
    zone: DisplayZone,
) -> Vec<Bucket> {
    let mut counts = [0usize; 7];
    for event in events
        .iter()
        .filter(|e| e.technician_ids.iter().any(|t| t == technician_id))
    {
        let idx = zone.localize(event.start()).weekday().num_days_from_sunday() as usize;
        counts[idx] += 1;
    }
    WEEK.iter()
        .zip(counts)
        .map(|(day, count)| Bucket {
            label: weekday_name(*day).to_string(),
            count,
        })
        .collect()
}
