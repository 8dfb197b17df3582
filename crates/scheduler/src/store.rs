//! Host-side view of the external store.
//!
//! [`EventStore`] owns the working set and the name directory. Reads come
//! from the last refresh; mutations go upstream first and are followed by a
//! refresh. Status changes are checked locally before any request is made.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fixwatch_core::summary::{self, Bucket, StatusTotals};
use fixwatch_core::{
    DisplayZone, EventDraft, EventStatus, HistoryAggregator, MaintenanceEvent,
    StatusTransitionGuard,
};
use fixwatch_notify::SharedDirectory;

use crate::source::{EventSource, SourceError};
use crate::working_set::WorkingSet;

pub struct EventStore {
    source: Arc<dyn EventSource>,
    working_set: WorkingSet,
    directory: SharedDirectory,
    guard: StatusTransitionGuard,
    history: HistoryAggregator,
}

impl EventStore {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            working_set: WorkingSet::new(),
            directory: SharedDirectory::default(),
            guard: StatusTransitionGuard,
            history: HistoryAggregator::default(),
        }
    }

    pub fn with_history(mut self, history: HistoryAggregator) -> Self {
        self.history = history;
        self
    }

    pub fn working_set(&self) -> WorkingSet {
        self.working_set.clone()
    }

    pub fn directory(&self) -> SharedDirectory {
        Arc::clone(&self.directory)
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Reload events and names from the source. On failure the previous
    /// snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, SourceError> {
        let events = self.source.list_events().await?;
        let count = self.working_set.replace(events);

        match self.source.directory().await {
            Ok(found) => {
                let mut directory = self.directory.write().unwrap_or_else(|e| e.into_inner());
                directory.merge(found);
            }
            Err(e) => warn!(error = %e, "directory refresh failed, keeping previous names"),
        }

        debug!(source = self.source_name(), events = count, "working set refreshed");
        Ok(count)
    }

    /// Submit a new appointment.
    pub async fn create(&self, draft: &EventDraft) -> Result<MaintenanceEvent, SourceError> {
        draft.validate()?;
        let created = self.source.create_event(draft).await?;
        info!(event_id = %created.id, start = %created.start(), "event created");
        self.working_set.upsert(created.clone());
        self.refresh_after_mutation().await;
        Ok(created)
    }

    /// Move an event to `to`. Refused transitions never reach the source.
    pub async fn update_status(&self, id: &str, to: EventStatus) -> Result<MaintenanceEvent, SourceError> {
        let current = self
            .working_set
            .get(id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        self.guard.check(&current, to)?;

        if current.status() == to {
            return Ok(current);
        }

        let updated = self.source.update_status(id, to).await?;
        info!(event_id = %id, from = %current.status(), to = %to, "event status updated");
        self.working_set.upsert(updated.clone());
        self.refresh_after_mutation().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SourceError> {
        self.source.delete_event(id).await?;
        self.working_set.remove(id);
        info!(event_id = %id, "event deleted");
        self.refresh_after_mutation().await;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<MaintenanceEvent> {
        self.working_set.get(id)
    }

    /// Past completed services on the same asset as event `id`.
    pub fn history(&self, id: &str) -> Result<Vec<MaintenanceEvent>, SourceError> {
        let target = self
            .working_set
            .get(id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        Ok(self.history.history_for_asset(&target, &self.working_set.snapshot()))
    }

    pub fn status_totals(&self) -> StatusTotals {
        StatusTotals::from_events(&self.working_set.snapshot())
    }

    pub fn monthly_counts(&self, zone: DisplayZone) -> Vec<Bucket> {
        summary::monthly_counts(&self.working_set.snapshot(), zone)
    }

    /// Events assigned to `technician_id`, asked of the source. Falls back to
    /// the working set when the source cannot answer.
    pub async fn assigned_to(&self, technician_id: &str) -> Vec<MaintenanceEvent> {
        match self.source.list_assigned(technician_id).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, technician_id, "assigned lookup failed, using working set");
                self.working_set
                    .snapshot()
                    .iter()
                    .filter(|ev| ev.technician_ids.iter().any(|t| t == technician_id))
                    .cloned()
                    .collect()
            }
        }
    }

    pub async fn assigned_by_weekday(&self, technician_id: &str, zone: DisplayZone) -> Vec<Bucket> {
        let events = self.assigned_to(technician_id).await;
        summary::assigned_by_weekday(&events, technician_id, zone)
    }

    /// Periodically refresh until `shutdown` flips to `true`.
    pub fn spawn_refresh(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; callers refresh before spawning.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.refresh().await {
                            warn!(error = %e, "event refresh failed, keeping previous snapshot");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("refresh loop stopped");
        })
    }

    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "refresh after mutation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use fixwatch_core::{Technician, Directory};

    use crate::source::InMemoryEventSource;

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 2, 0, 0).unwrap()
    }

    fn ev(id: &str, day: u32, status: EventStatus) -> MaintenanceEvent {
        MaintenanceEvent::new(id, t(day), t(day) + ChronoDuration::hours(1), status)
            .unwrap()
            .with_asset("ac-1")
            .with_technicians(["t1"])
    }

    async fn store(events: Vec<MaintenanceEvent>) -> EventStore {
        let mut dir = Directory::new();
        dir.insert_technician(Technician {
            id: "t1".into(),
            first_name: "Ana".into(),
            last_name: "Reyes".into(),
        });
        let source = InMemoryEventSource::with_events(events).with_directory(dir);
        let store = EventStore::new(Arc::new(source));
        store.refresh().await.unwrap();
        store
    }

    #[tokio::test]
    async fn refresh_loads_events_and_names() {
        let store = store(vec![ev("a", 1, EventStatus::Scheduled)]).await;
        assert_eq!(store.working_set().len(), 1);
        assert_eq!(store.directory().read().unwrap().technician_name("t1"), "Ana Reyes");
    }

    #[tokio::test]
    async fn refused_transition_leaves_event_unchanged() {
        let store = store(vec![ev("a", 1, EventStatus::Completed)]).await;
        let err = store.update_status("a", EventStatus::Canceled).await.unwrap_err();
        assert!(matches!(err, SourceError::Transition(_)));
        assert_eq!(store.get("a").unwrap().status(), EventStatus::Completed);
    }

    #[tokio::test]
    async fn accepted_transition_updates_snapshot() {
        let store = store(vec![ev("a", 1, EventStatus::Scheduled)]).await;
        let updated = store.update_status("a", EventStatus::Completed).await.unwrap();
        assert_eq!(updated.status(), EventStatus::Completed);
        assert_eq!(store.get("a").unwrap().status(), EventStatus::Completed);
        assert_eq!(store.status_totals().completed, 1);
    }

    #[tokio::test]
    async fn scheduled_to_scheduled_is_a_no_op() {
        let store = store(vec![ev("a", 1, EventStatus::Scheduled)]).await;
        let same = store.update_status("a", EventStatus::Scheduled).await.unwrap();
        assert_eq!(same.status(), EventStatus::Scheduled);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = store(vec![]).await;
        assert!(matches!(
            store.update_status("ghost", EventStatus::Completed).await,
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(store.history("ghost"), Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_and_delete_round_through_source() {
        let store = store(vec![]).await;
        let draft = EventDraft {
            title: "Install".into(),
            task_descriptions: vec!["Mounting".into()],
            start: t(5),
            end: t(5) + ChronoDuration::hours(3),
            asset_id: "ac-2".into(),
            technician_ids: vec!["t1".into()],
            status: EventStatus::Scheduled,
            notes: None,
        };
        let created = store.create(&draft).await.unwrap();
        assert!(store.get(&created.id).is_some());

        store.delete(&created.id).await.unwrap();
        assert!(store.get(&created.id).is_none());
        assert!(store.working_set().is_empty());
    }

    #[tokio::test]
    async fn history_is_same_asset_completed_most_recent_first() {
        let store = store(vec![
            ev("h1", 1, EventStatus::Completed),
            ev("h2", 3, EventStatus::Completed),
            ev("c", 2, EventStatus::Canceled),
            ev("target", 10, EventStatus::Scheduled),
            ev("other", 4, EventStatus::Completed).with_asset("ac-9"),
        ])
        .await;
        let ids: Vec<String> = store.history("target").unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["h2", "h1"]);
    }

    #[tokio::test]
    async fn dashboard_summaries_read_the_snapshot() {
        let store = store(vec![
            ev("a", 2, EventStatus::Scheduled),
            ev("b", 3, EventStatus::Completed),
        ])
        .await;
        let zone = DisplayZone::default();
        let months = store.monthly_counts(zone);
        assert_eq!(months[2].count, 2);
        let weekdays = store.assigned_by_weekday("t1", zone).await;
        assert_eq!(weekdays.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[tokio::test]
    async fn assigned_events_come_from_the_source() {
        let store = store(vec![
            ev("mine", 2, EventStatus::Scheduled),
            ev("theirs", 3, EventStatus::Scheduled).with_technicians(["t2"]),
        ])
        .await;
        let ids: Vec<String> = store.assigned_to("t1").await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["mine"]);
        assert!(store.assigned_to("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn assigned_lookup_falls_back_to_working_set() {
        let store = EventStore::new(Arc::new(FailingSource));
        store
            .working_set()
            .replace(vec![ev("cached", 2, EventStatus::Scheduled)]);
        let ids: Vec<String> = store.assigned_to("t1").await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["cached"]);
        let weekdays = store.assigned_by_weekday("t1", DisplayZone::default()).await;
        assert_eq!(weekdays.iter().map(|b| b.count).sum::<usize>(), 1);
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl EventSource for FailingSource {
        async fn list_events(&self) -> Result<Vec<MaintenanceEvent>, SourceError> {
            Err(SourceError::Status {
                status: 503,
                body: "down".into(),
            })
        }

        async fn create_event(&self, _draft: &EventDraft) -> Result<MaintenanceEvent, SourceError> {
            Err(SourceError::NotFound("create".into()))
        }

        async fn update_status(
            &self,
            id: &str,
            _status: EventStatus,
        ) -> Result<MaintenanceEvent, SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        }

        async fn delete_event(&self, id: &str) -> Result<(), SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        }

        fn source_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_loop_stops_on_shutdown() {
        let store = Arc::new(store(vec![]).await);
        let (tx, rx) = watch::channel(false);
        let handle = Arc::clone(&store).spawn_refresh(Duration::from_secs(60), rx);
        tokio::time::sleep(Duration::from_secs(130)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
