//! Turns a due maintenance event into an alert and hands it to the
//! configured channels.
//!
//! The dispatcher is the only component that calls out. It never returns an
//! error: permission refusals, template problems, channel failures and
//! timeouts are logged and folded into the [`DispatchReport`]. Individual
//! channel failures don't block other channels.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use fixwatch_core::{Directory, DisplayZone, MaintenanceEvent};

use crate::templating::{
    AlertContext, TemplateRenderer, DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE,
};
use crate::traits::{
    AlertChannel, DispatchOutcome, DispatchReport, DispatchResult, Notification, NotifyError,
    Permission,
};

/// Default upper bound on a single channel delivery.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared, refreshable lookup of technician and asset names.
pub type SharedDirectory = Arc<RwLock<Directory>>;

/// Formatting and timeout options for a [`NotificationDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub zone: DisplayZone,
    pub timeout: Duration,
    pub subject_template: String,
    pub body_template: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            zone: DisplayZone::default(),
            timeout: DEFAULT_DISPATCH_TIMEOUT,
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }
}

/// Formats due events and delivers them to every permitted channel.
pub struct NotificationDispatcher {
    /// Channels that granted permission at connect time.
    channels: Vec<Box<dyn AlertChannel>>,
    directory: SharedDirectory,
    renderer: TemplateRenderer,
    options: DispatchOptions,
}

impl NotificationDispatcher {
    /// Query each channel's permission once and keep the ones that grant it.
    ///
    /// # Errors
    ///
    /// [`NotifyError::Template`] if a configured template does not parse.
    pub async fn connect(
        channels: Vec<Box<dyn AlertChannel>>,
        directory: SharedDirectory,
        options: DispatchOptions,
    ) -> Result<Self, NotifyError> {
        let renderer = TemplateRenderer::new();
        renderer.validate(&options.subject_template)?;
        renderer.validate(&options.body_template)?;

        let mut permitted = Vec::with_capacity(channels.len());
        for channel in channels {
            let permission = channel.request_permission().await;
            match permission {
                Permission::Granted => {
                    tracing::info!(channel = channel.channel_name(), "alert channel ready");
                    permitted.push(channel);
                }
                Permission::Denied | Permission::Unsupported => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        %permission,
                        "alert channel disabled"
                    );
                }
            }
        }

        if permitted.is_empty() {
            tracing::warn!("no alert channel permitted; alerts will be skipped");
        }

        Ok(Self {
            channels: permitted,
            directory,
            renderer,
            options,
        })
    }

    /// Dispatcher with no channels, which skips every alert.
    pub fn disabled() -> Self {
        Self {
            channels: Vec::new(),
            directory: SharedDirectory::default(),
            renderer: TemplateRenderer::new(),
            options: DispatchOptions::default(),
        }
    }

    /// Whether any channel is available for delivery.
    pub fn is_enabled(&self) -> bool {
        !self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    pub fn directory(&self) -> SharedDirectory {
        Arc::clone(&self.directory)
    }

    /// Build the alert for an event without sending it.
    pub fn render(&self, event: &MaintenanceEvent) -> Result<Notification, NotifyError> {
        let ctx = {
            let directory = self
                .directory
                .read()
                .map_err(|e| NotifyError::Config(format!("directory lock poisoned: {e}")))?;
            AlertContext::from_event(event, &directory, self.options.zone)
        };

        let subject = self.renderer.render(&self.options.subject_template, &ctx)?;
        let body = self.renderer.render(&self.options.body_template, &ctx)?;

        Ok(Notification {
            subject,
            body,
            metadata: HashMap::from([
                ("event_id".to_string(), event.id.clone()),
                ("status".to_string(), ctx.status),
                ("start".to_string(), event.start().to_rfc3339()),
            ]),
        })
    }

    /// Deliver an alert for `event` to every permitted channel.
    ///
    /// Each delivery is bounded by the configured timeout; a timeout counts
    /// as a failed delivery. Nothing is retried.
    pub async fn dispatch(&self, event: &MaintenanceEvent) -> DispatchReport {
        if self.channels.is_empty() {
            tracing::debug!(event_id = %event.id, "alerts disabled, skipping dispatch");
            return DispatchReport {
                event_id: event.id.clone(),
                outcome: DispatchOutcome::Skipped,
                results: Vec::new(),
            };
        }

        let notification = match self.render(event) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "failed to build alert");
                return DispatchReport {
                    event_id: event.id.clone(),
                    outcome: DispatchOutcome::Failed,
                    results: Vec::new(),
                };
            }
        };

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = Instant::now();
            let result = match tokio::time::timeout(self.options.timeout, channel.send(&notification)).await {
                Ok(r) => r,
                Err(_) => Err(NotifyError::Timeout {
                    timeout_ms: self.options.timeout.as_millis() as u64,
                }),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        event_id = %event.id,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Alert delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.id,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        let delivered = results.iter().filter(|r| r.success).count();
        let outcome = if delivered == results.len() {
            DispatchOutcome::Delivered
        } else if delivered == 0 {
            DispatchOutcome::Failed
        } else {
            DispatchOutcome::Partial
        };

        DispatchReport {
            event_id: event.id.clone(),
            outcome,
            results,
        }
    }
}
