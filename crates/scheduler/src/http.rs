//! REST-backed [`EventSource`].
//!
//! Endpoints, relative to the base URL:
//!
//! | Method   | Path                      | Purpose                     |
//! |----------|---------------------------|-----------------------------|
//! | `GET`    | `/events`                 | full event list             |
//! | `POST`   | `/events`                 | create                      |
//! | `PATCH`  | `/events/{id}`            | status update               |
//! | `DELETE` | `/events/{id}`            | delete                      |
//! | `GET`    | `/events/assigned/{tech}` | events for one technician   |
//! | `GET`    | `/admins`                 | technician names            |
//! | `GET`    | `/aircon`                 | asset serial numbers        |
//!
//! Event records use `_id`, a `description` that is either a string or a
//! list, and `aircon` / `technicians` references that are either bare ids or
//! populated documents. Populated documents feed the [`Directory`].

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fixwatch_core::{
    Asset, Directory, EventDraft, EventStatus, MaintenanceEvent, Technician, ValidationError,
};

use crate::source::{EventSource, SourceError};

// ── Wire records ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reference<T> {
    Id(String),
    Populated(T),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Description {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct TechnicianRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default, alias = "firstName")]
    firstname: String,
    #[serde(default, alias = "lastName")]
    lastname: String,
}

impl From<TechnicianRecord> for Technician {
    fn from(r: TechnicianRecord) -> Self {
        Technician {
            id: r.id,
            first_name: r.firstname,
            last_name: r.lastname,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default, rename = "serialNumber")]
    serial_number: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

impl From<AssetRecord> for Asset {
    fn from(r: AssetRecord) -> Self {
        Asset {
            id: r.id,
            serial_number: r.serial_number,
            brand: r.brand,
            model: r.model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<Description>,
    start: String,
    end: String,
    #[serde(default)]
    aircon: Option<Reference<AssetRecord>>,
    #[serde(default)]
    technicians: Vec<Reference<TechnicianRecord>>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

impl EventRecord {
    /// Validate into a domain event, collecting any populated names into
    /// `directory`.
    fn into_event(self, directory: &mut Directory) -> Result<MaintenanceEvent, ValidationError> {
        let start = parse_timestamp("start", &self.start)?;
        let end = parse_timestamp("end", &self.end)?;
        let status: EventStatus = self.status.as_deref().unwrap_or_default().parse()?;

        let mut event = MaintenanceEvent::new(self.id, start, end, status)?;
        event.title = self.title;
        event.notes = self.notes;

        if let Some(description) = self.description {
            event = event.with_tasks(match description {
                Description::One(text) if text.trim().is_empty() => Vec::new(),
                Description::One(text) => vec![text],
                Description::Many(items) => items,
            });
        }

        if let Some(aircon) = self.aircon {
            let asset_id = match aircon {
                Reference::Id(id) => id,
                Reference::Populated(record) => {
                    let asset = Asset::from(record);
                    let id = asset.id.clone();
                    directory.insert_asset(asset);
                    id
                }
            };
            event = event.with_asset(asset_id);
        }

        let mut technician_ids = Vec::with_capacity(self.technicians.len());
        for technician in self.technicians {
            match technician {
                Reference::Id(id) => technician_ids.push(id),
                Reference::Populated(record) => {
                    let technician = Technician::from(record);
                    technician_ids.push(technician.id.clone());
                    directory.insert_technician(technician);
                }
            }
        }
        Ok(event.with_technicians(technician_ids))
    }
}

/// Decode a list of raw records, skipping the ones that don't validate.
fn decode_events(values: Vec<serde_json::Value>, directory: &mut Directory) -> Vec<MaintenanceEvent> {
    let mut events = Vec::with_capacity(values.len());
    for value in values {
        let id = value
            .get("_id")
            .and_then(|v| v.as_str())
            .unwrap_or("<missing>")
            .to_string();
        let result = serde_json::from_value::<EventRecord>(value)
            .map_err(|e| e.to_string())
            .and_then(|record| record.into_event(directory).map_err(|e| e.to_string()));
        match result {
            Ok(event) => events.push(event),
            Err(error) => warn!(event_id = %id, %error, "skipping invalid event record"),
        }
    }
    events
}

fn decode_one(value: serde_json::Value, directory: &mut Directory) -> Result<MaintenanceEvent, SourceError> {
    let record: EventRecord =
        serde_json::from_value(value).map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(record.into_event(directory)?)
}

#[derive(Debug, Serialize)]
struct NewEventBody<'a> {
    title: &'a str,
    description: &'a [String],
    start: String,
    end: String,
    aircon: &'a str,
    technicians: &'a [String],
    status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

impl<'a> From<&'a EventDraft> for NewEventBody<'a> {
    fn from(d: &'a EventDraft) -> Self {
        Self {
            title: &d.title,
            description: &d.task_descriptions,
            start: d.start.to_rfc3339(),
            end: d.end.to_rfc3339(),
            aircon: &d.asset_id,
            technicians: &d.technician_ids,
            status: d.status,
            notes: d.notes.as_deref(),
        }
    }
}

// ── Client ────────────────────────────────────────────────────

pub struct HttpEventSource {
    base_url: String,
    http: reqwest::Client,
    /// Names picked up from populated references on the last reads.
    seen: Mutex<Directory>,
}

impl HttpEventSource {
    /// # Errors
    ///
    /// [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http,
            seen: Mutex::new(Directory::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decode_all(&self, values: Vec<serde_json::Value>) -> Vec<MaintenanceEvent> {
        let mut found = Directory::new();
        let events = decode_events(values, &mut found);
        self.remember(found);
        events
    }

    fn remember(&self, found: Directory) {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).merge(found);
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, id: Option<&str>) -> Result<T, SourceError> {
        let resp = self.http.get(self.url(path)).send().await?;
        Ok(check_status(resp, id).await?.json().await?)
    }
}

/// Map non-2xx responses to errors; a 404 on an id-addressed call becomes
/// [`SourceError::NotFound`].
async fn check_status(resp: reqwest::Response, id: Option<&str>) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(SourceError::NotFound(id.to_string()));
        }
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SourceError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn list_events(&self) -> Result<Vec<MaintenanceEvent>, SourceError> {
        let values: Vec<serde_json::Value> = self.get_json("/events", None).await?;
        let total = values.len();
        let events = self.decode_all(values);
        debug!(total, valid = events.len(), "fetched events");
        Ok(events)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<MaintenanceEvent, SourceError> {
        draft.validate()?;
        let resp = self
            .http
            .post(self.url("/events"))
            .json(&NewEventBody::from(draft))
            .send()
            .await?;
        let value: serde_json::Value = check_status(resp, None).await?.json().await?;
        let mut found = Directory::new();
        let event = decode_one(value, &mut found)?;
        self.remember(found);
        Ok(event)
    }

    async fn update_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> Result<MaintenanceEvent, SourceError> {
        let resp = self
            .http
            .patch(self.url(&format!("/events/{id}")))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        let value: serde_json::Value = check_status(resp, Some(id)).await?.json().await?;
        let mut found = Directory::new();
        let event = decode_one(value, &mut found)?;
        self.remember(found);
        Ok(event)
    }

    async fn delete_event(&self, id: &str) -> Result<(), SourceError> {
        let resp = self
            .http
            .delete(self.url(&format!("/events/{id}")))
            .send()
            .await?;
        check_status(resp, Some(id)).await?;
        Ok(())
    }

    /// Served by `/events/assigned/{technician_id}`.
    async fn list_assigned(&self, technician_id: &str) -> Result<Vec<MaintenanceEvent>, SourceError> {
        let values: Vec<serde_json::Value> = self
            .get_json(&format!("/events/assigned/{technician_id}"), None)
            .await?;
        Ok(self.decode_all(values))
    }

    /// Names from `/admins` and `/aircon`, merged over those seen in event
    /// records. Either lookup failing only costs its names.
    async fn directory(&self) -> Result<Directory, SourceError> {
        let mut directory = self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone();

        match self.get_json::<Vec<TechnicianRecord>>("/admins", None).await {
            Ok(records) => records
                .into_iter()
                .for_each(|r| directory.insert_technician(r.into())),
            Err(e) => warn!(error = %e, "could not fetch technicians"),
        }
        match self.get_json::<Vec<AssetRecord>>("/aircon", None).await {
            Ok(records) => records
                .into_iter()
                .for_each(|r| directory.insert_asset(r.into())),
            Err(e) => warn!(error = %e, "could not fetch assets"),
        }

        Ok(directory)
    }

    fn source_name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> serde_json::Value {
        json!({
            "_id": "65f0c0ffee",
            "title": "Aircon cleaning",
            "description": ["Filter cleaning", "Coil check"],
            "start": "2026-02-16T01:30:00.000Z",
            "end": "2026-02-16T03:30:00.000Z",
            "aircon": {"_id": "ac-1", "serialNumber": "SN-42", "brand": "Carrier"},
            "technicians": [
                {"_id": "t1", "firstname": "Ana", "lastname": "Reyes"},
                "t2"
            ],
            "status": "Scheduled",
            "notes": "Gate code 1234"
        })
    }

    #[test]
    fn populated_record_decodes_with_names() {
        let mut dir = Directory::new();
        let events = decode_events(vec![record()], &mut dir);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.id, "65f0c0ffee");
        assert_eq!(event.task_descriptions, vec!["Filter cleaning", "Coil check"]);
        assert_eq!(event.asset_id.as_deref(), Some("ac-1"));
        assert_eq!(event.technician_ids, vec!["t1", "t2"]);
        assert_eq!(event.status(), EventStatus::Scheduled);

        assert_eq!(dir.asset_label("ac-1"), "SN-42");
        assert_eq!(dir.technician_name("t1"), "Ana Reyes");
        assert_eq!(dir.technician_name("t2"), "t2");
    }

    #[test]
    fn bare_references_and_string_description() {
        let mut value = record();
        value["aircon"] = json!("ac-9");
        value["description"] = json!("Installation");
        value["technicians"] = json!(["t3"]);
        let mut dir = Directory::new();
        let events = decode_events(vec![value], &mut dir);
        assert_eq!(events[0].asset_id.as_deref(), Some("ac-9"));
        assert_eq!(events[0].task_descriptions, vec!["Installation"]);
        assert_eq!(dir.asset_count(), 0);
    }

    #[test]
    fn invalid_records_are_skipped() {
        let mut inverted = record();
        inverted["_id"] = json!("inverted");
        inverted["end"] = json!("2026-02-16T00:00:00Z");

        let mut unknown_status = record();
        unknown_status["_id"] = json!("pending");
        unknown_status["status"] = json!("Pending");

        let mut bad_time = record();
        bad_time["_id"] = json!("bad-time");
        bad_time["start"] = json!("tomorrow");

        let mut no_status = record();
        no_status["_id"] = json!("no-status");
        no_status.as_object_mut().unwrap().remove("status");

        let mut dir = Directory::new();
        let events = decode_events(
            vec![inverted, record(), unknown_status, bad_time, no_status, json!({"title": "no id"})],
            &mut dir,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "65f0c0ffee");
    }

    #[test]
    fn invalid_timestamp_names_field() {
        let err = parse_timestamp("end", "not a date").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidTimestamp {
                field: "end",
                value: "not a date".into()
            }
        );
    }

    #[test]
    fn new_event_body_uses_wire_names() {
        let start = DateTime::parse_from_rfc3339("2026-02-16T01:30:00Z").unwrap().with_timezone(&Utc);
        let draft = EventDraft {
            title: "Install".into(),
            task_descriptions: vec!["Mounting".into()],
            start,
            end: start + chrono::Duration::hours(1),
            asset_id: "ac-1".into(),
            technician_ids: vec!["t1".into()],
            status: EventStatus::Scheduled,
            notes: None,
        };
        let body = serde_json::to_value(NewEventBody::from(&draft)).unwrap();
        assert_eq!(body["aircon"], "ac-1");
        assert_eq!(body["description"], json!(["Mounting"]));
        assert_eq!(body["status"], "Scheduled");
        assert!(body.get("notes").is_none());
    }

    #[test]
    fn base_url_is_normalized() {
        let source = HttpEventSource::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(source.base_url(), "http://localhost:5000/api");
        assert_eq!(source.url("/events"), "http://localhost:5000/api/events");
    }

    /// Serve one canned JSON response and hand back the request line.
    async fn serve_once(body: serde_json::Value) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let request = String::from_utf8_lossy(&request).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (base, task)
    }

    #[tokio::test]
    async fn assigned_events_use_the_technician_endpoint() {
        let mut unrelated_name = record();
        unrelated_name["_id"] = json!("second");
        let (base, server) = serve_once(json!([record(), unrelated_name, {"title": "broken"}])).await;

        let source = HttpEventSource::new(&base, Duration::from_secs(5)).unwrap();
        let events = source.list_assigned("t1").await.unwrap();

        assert_eq!(server.await.unwrap(), "GET /events/assigned/t1 HTTP/1.1");
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["65f0c0ffee", "second"]);
        assert_eq!(source.seen.lock().unwrap().technician_name("t1"), "Ana Reyes");
    }
}
