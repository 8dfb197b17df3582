//! Maintenance event model and its status enumeration.
//!
//! A [`MaintenanceEvent`] can only be obtained through validation
//! ([`MaintenanceEvent::new`] or deserialization), so every instance in the
//! working set satisfies `end >= start` and carries a known status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Lifecycle state of a maintenance event.
///
/// `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl EventStatus {
    pub const ALL: [EventStatus; 3] = [
        EventStatus::Scheduled,
        EventStatus::Completed,
        EventStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "Scheduled",
            EventStatus::Completed => "Completed",
            EventStatus::Canceled => "Canceled",
        }
    }

    /// Whether no further transition is permitted from this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EventStatus::Scheduled)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(EventStatus::Scheduled),
            "completed" => Ok(EventStatus::Completed),
            "canceled" | "cancelled" => Ok(EventStatus::Canceled),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A scheduled maintenance appointment for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventFields", rename_all = "camelCase")]
pub struct MaintenanceEvent {
    /// Opaque identifier assigned by the external store.
    pub id: String,
    pub title: Option<String>,
    /// Task labels in the order they were entered.
    pub task_descriptions: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// Weak reference to the serviced asset.
    pub asset_id: Option<String>,
    pub technician_ids: Vec<String>,
    status: EventStatus,
    pub notes: Option<String>,
}

/// Unvalidated field bag used as the deserialization target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventFields {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    task_descriptions: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    asset_id: Option<String>,
    #[serde(default)]
    technician_ids: Vec<String>,
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<EventFields> for MaintenanceEvent {
    type Error = ValidationError;

    fn try_from(f: EventFields) -> Result<Self, Self::Error> {
        let status = f.status.parse()?;
        let mut event = MaintenanceEvent::new(f.id, f.start, f.end, status)?;
        event.title = f.title;
        event.task_descriptions = f.task_descriptions;
        event.asset_id = f.asset_id;
        event.set_technicians(f.technician_ids);
        event.notes = f.notes;
        Ok(event)
    }
}

impl MaintenanceEvent {
    /// Validate and build an event with empty optional fields.
    ///
    /// # Errors
    ///
    /// [`ValidationError::MissingId`] for a blank id and
    /// [`ValidationError::EndBeforeStart`] when `end < start`.
    pub fn new(
        id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: EventStatus,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::MissingId);
        }
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        Ok(Self {
            id,
            title: None,
            task_descriptions: Vec::new(),
            start,
            end,
            asset_id: None,
            technician_ids: Vec::new(),
            status,
            notes: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.task_descriptions = tasks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    pub fn with_technicians<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_technicians(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Technician references form a set; repeated ids keep their first position.
    fn set_technicians(&mut self, ids: Vec<String>) {
        let mut seen = std::collections::HashSet::with_capacity(ids.len());
        self.technician_ids = ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Only the transition guard may move an event between states.
    pub(crate) fn set_status(&mut self, status: EventStatus) {
        self.status = status;
    }
}

/// A new appointment as submitted to the external store, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub task_descriptions: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub asset_id: String,
    pub technician_ids: Vec<String>,
    pub status: EventStatus,
    pub notes: Option<String>,
}

impl EventDraft {
    /// Check the draft before it is submitted upstream.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.end < self.start {
            return Err(ValidationError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Materialize the draft once the store has assigned an id.
    pub fn into_event(self, id: impl Into<String>) -> Result<MaintenanceEvent, ValidationError> {
        let mut event = MaintenanceEvent::new(id, self.start, self.end, self.status)?
            .with_title(self.title)
            .with_tasks(self.task_descriptions)
            .with_asset(self.asset_id)
            .with_technicians(self.technician_ids);
        event.notes = self.notes;
        Ok(event)
    }
}
