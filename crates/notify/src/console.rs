//! Alert channel that writes alerts to the process log.

use crate::traits::{AlertChannel, Notification, NotifyError};

/// Emits each alert as a `tracing` event under the `fixwatch::alert` target.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AlertChannel for ConsoleChannel {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            target: "fixwatch::alert",
            event_id = notification.event_id().unwrap_or_default(),
            subject = %notification.subject,
            "\n{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Permission;
    use std::collections::HashMap;

    #[tokio::test]
    async fn console_always_delivers() {
        let channel = ConsoleChannel::new();
        assert_eq!(channel.request_permission().await, Permission::Granted);
        let n = Notification {
            subject: "Upcoming Event".into(),
            body: "Title: test".into(),
            metadata: HashMap::new(),
        };
        assert!(channel.send(&n).await.is_ok());
        assert_eq!(channel.channel_name(), "console");
    }
}
