//! Upcoming-event alerting for maintenance schedules.
//!
//! This crate provides:
//! - `NotificationDeduper`, the at-most-once record of alerted events
//! - `UpcomingEventScanner`, which finds events entering the lookahead window
//! - `ScanRunner`, the timer loop driving scans against a `WorkingSet`
//! - `EventSource` with in-memory and HTTP implementations, and the
//!   `EventStore` that keeps the working set in sync with it

pub mod dedup;
pub mod http;
pub mod runner;
pub mod scanner;
pub mod source;
pub mod store;
pub mod working_set;

pub use dedup::NotificationDeduper;
pub use http::HttpEventSource;
pub use runner::{system_clock, Clock, RunStats, ScanHandle, ScanRunner};
pub use scanner::{ScanReport, UpcomingEventScanner, DEFAULT_LOOKAHEAD_MINUTES};
pub use source::{EventSource, InMemoryEventSource, SourceError};
pub use store::EventStore;
pub use working_set::WorkingSet;
