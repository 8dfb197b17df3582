//! Domain model for maintenance scheduling: events, status transitions,
//! service history, dashboard summaries and configuration.

pub mod config;
pub mod directory;
pub mod error;
pub mod event;
pub mod history;
pub mod summary;
pub mod time;
pub mod transition;

pub use config::Config;
pub use directory::{Asset, Directory, Technician};
pub use error::*;
pub use event::{EventDraft, EventStatus, MaintenanceEvent};
pub use history::{HistoryAggregator, HistoryOrder};
pub use time::DisplayZone;
pub use transition::{can_transition, StatusTransitionGuard};
