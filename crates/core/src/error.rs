use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::EventStatus;

/// A maintenance event was rejected at the boundary and never enters the
/// working set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Event end {end} is before start {start}")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Unknown event status: {0:?}")]
    UnknownStatus(String),

    #[error("Event id must not be empty")]
    MissingId,

    #[error("Invalid timestamp for {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// A status change was refused; the event is left unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition for event {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: EventStatus,
        to: EventStatus,
    },
}
