//! Boundary to the external event store.
//!
//! [`EventSource`] is the seam between the engine and whatever persists
//! events. [`InMemoryEventSource`] backs tests and offline runs;
//! [`crate::http::HttpEventSource`] talks to the REST backend.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use fixwatch_core::{
    Asset, Directory, EventDraft, EventStatus, MaintenanceEvent, StatusTransitionGuard,
    Technician, TransitionError, ValidationError,
};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event source returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Malformed payload: {0}")]
    Decode(String),
}

/// CRUD access to the external event store.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Every event the store currently holds. Records that fail validation
    /// are skipped, not returned as errors.
    async fn list_events(&self) -> Result<Vec<MaintenanceEvent>, SourceError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<MaintenanceEvent, SourceError>;

    async fn update_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> Result<MaintenanceEvent, SourceError>;

    async fn delete_event(&self, id: &str) -> Result<(), SourceError>;

    /// Events that list `technician_id` among their technicians.
    async fn list_assigned(&self, technician_id: &str) -> Result<Vec<MaintenanceEvent>, SourceError> {
        let mut events = self.list_events().await?;
        events.retain(|e| e.technician_ids.iter().any(|t| t == technician_id));
        Ok(events)
    }

    /// Technician and asset names known to the store.
    async fn directory(&self) -> Result<Directory, SourceError> {
        Ok(Directory::new())
    }

    fn source_name(&self) -> &str;
}

/// Seed file layout for [`InMemoryEventSource::from_json`].
#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    events: Vec<MaintenanceEvent>,
    #[serde(default)]
    technicians: Vec<Technician>,
    #[serde(default)]
    assets: Vec<Asset>,
}

/// Process-local event store.
#[derive(Debug, Default)]
pub struct InMemoryEventSource {
    events: Mutex<Vec<MaintenanceEvent>>,
    directory: Mutex<Directory>,
    guard: StatusTransitionGuard,
}

impl InMemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<MaintenanceEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    pub fn with_directory(self, directory: Directory) -> Self {
        Self {
            directory: Mutex::new(directory),
            ..self
        }
    }

    /// Load a seed document: `{"events": [...], "technicians": [...], "assets": [...]}`.
    ///
    /// # Errors
    ///
    /// [`SourceError::Decode`] if the document is malformed or any event
    /// fails validation.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        let seed: Seed = serde_json::from_str(json).map_err(|e| SourceError::Decode(e.to_string()))?;
        let mut directory = Directory::new();
        for technician in seed.technicians {
            directory.insert_technician(technician);
        }
        for asset in seed.assets {
            directory.insert_asset(asset);
        }
        debug!(events = seed.events.len(), "loaded in-memory seed");
        Ok(Self::with_events(seed.events).with_directory(directory))
    }

    fn events(&self) -> std::sync::MutexGuard<'_, Vec<MaintenanceEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn list_events(&self) -> Result<Vec<MaintenanceEvent>, SourceError> {
        Ok(self.events().clone())
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<MaintenanceEvent, SourceError> {
        draft.validate()?;
        let event = draft.clone().into_event(uuid::Uuid::new_v4().to_string())?;
        self.events().push(event.clone());
        Ok(event)
    }

    async fn update_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> Result<MaintenanceEvent, SourceError> {
        let mut events = self.events();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        self.guard.apply_transition(event, status)?;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<(), SourceError> {
        let mut events = self.events();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(SourceError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn directory(&self) -> Result<Directory, SourceError> {
        Ok(self.directory.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 1, 0, 0).unwrap()
    }

    fn draft() -> EventDraft {
        EventDraft {
            title: "Aircon cleaning".into(),
            task_descriptions: vec!["Filter cleaning".into()],
            start: start(),
            end: start() + Duration::hours(2),
            asset_id: "ac-1".into(),
            technician_ids: vec!["t1".into()],
            status: EventStatus::Scheduled,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_unique_ids() {
        let source = InMemoryEventSource::new();
        let a = source.create_event(&draft()).await.unwrap();
        let b = source.create_event(&draft()).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(source.list_events().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_inverted_range() {
        let mut bad = draft();
        bad.end = bad.start - Duration::minutes(1);
        let err = InMemoryEventSource::new().create_event(&bad).await.unwrap_err();
        assert!(matches!(err, SourceError::Validation(ValidationError::EndBeforeStart { .. })));
    }

    #[tokio::test]
    async fn update_status_enforces_transitions() {
        let source = InMemoryEventSource::new();
        let created = source.create_event(&draft()).await.unwrap();

        let done = source.update_status(&created.id, EventStatus::Completed).await.unwrap();
        assert_eq!(done.status(), EventStatus::Completed);

        let err = source
            .update_status(&created.id, EventStatus::Canceled)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Transition(_)));
        let stored = source.list_events().await.unwrap();
        assert_eq!(stored[0].status(), EventStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let source = InMemoryEventSource::new();
        assert!(matches!(
            source.update_status("nope", EventStatus::Completed).await,
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(source.delete_event("nope").await, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_event() {
        let source = InMemoryEventSource::new();
        let created = source.create_event(&draft()).await.unwrap();
        source.delete_event(&created.id).await.unwrap();
        assert!(source.list_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seed_document_loads_events_and_names() {
        let json = r#"{
            "events": [{
                "id": "e1",
                "start": "2026-08-03T01:00:00Z",
                "end": "2026-08-03T02:00:00Z",
                "assetId": "ac-1",
                "technicianIds": ["t1"],
                "status": "Scheduled"
            }],
            "technicians": [{"id": "t1", "firstName": "Ana", "lastName": "Reyes"}],
            "assets": [{"id": "ac-1", "serialNumber": "SN-100"}]
        }"#;
        let source = InMemoryEventSource::from_json(json).unwrap();
        assert_eq!(source.list_events().await.unwrap().len(), 1);
        let dir = source.directory().await.unwrap();
        assert_eq!(dir.technician_name("t1"), "Ana Reyes");
        assert_eq!(dir.asset_label("ac-1"), "SN-100");
    }

    #[test]
    fn seed_with_invalid_event_is_rejected() {
        let json = r#"{"events": [{"id": "e1", "start": "2026-08-03T02:00:00Z",
            "end": "2026-08-03T01:00:00Z", "status": "Scheduled"}]}"#;
        assert!(matches!(InMemoryEventSource::from_json(json), Err(SourceError::Decode(_))));
    }
}
