//! Alert channel trait definition and shared error types.

use std::collections::HashMap;
use std::fmt;

/// Errors that can occur during alert delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Answer of an alert channel when asked whether it may deliver alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Unsupported,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Granted => write!(f, "granted"),
            Permission::Denied => write!(f, "denied"),
            Permission::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Additional metadata (e.g. `event_id`, `status`).
    pub metadata: HashMap<String, String>,
}

impl Notification {
    /// Id of the event this alert is about, so a host UI can navigate to it.
    pub fn event_id(&self) -> Option<&str> {
        self.metadata.get("event_id").map(String::as_str)
    }
}

/// A delivery mechanism for alerts (console, webhook, chat, email, ...).
#[async_trait::async_trait]
pub trait AlertChannel: Send + Sync {
    /// Ask whether this channel may deliver alerts. Queried once when the
    /// dispatcher connects.
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    /// Deliver an alert through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}

/// Result of delivering an alert to a single channel.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Overall result of one `dispatch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every permitted channel accepted the alert.
    Delivered,
    /// Some channels accepted the alert, others failed.
    Partial,
    /// No channel accepted the alert.
    Failed,
    /// No permitted channel; nothing was attempted.
    Skipped,
}

/// What happened when an event was dispatched.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event_id: String,
    pub outcome: DispatchOutcome,
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}
