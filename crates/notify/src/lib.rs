//! Alert delivery for upcoming maintenance events.
//!
//! This crate provides:
//! - `AlertChannel` trait for pluggable delivery channels
//! - Console, webhook, Telegram and email channel implementations
//! - Minijinja rendering of the alert payload
//! - `NotificationDispatcher`, which formats a due event and hands it to the
//!   permitted channels

pub mod console;
pub mod dispatcher;
pub mod email;
pub mod telegram;
pub mod templating;
pub mod traits;
pub mod webhook;

use std::sync::Arc;

use fixwatch_core::config::AlertConfig;

pub use console::ConsoleChannel;
pub use dispatcher::{DispatchOptions, NotificationDispatcher, SharedDirectory};
pub use email::EmailChannel;
pub use telegram::TelegramChannel;
pub use templating::{AlertContext, TemplateRenderer};
pub use traits::{
    AlertChannel, DispatchOutcome, DispatchReport, DispatchResult, Notification, NotifyError,
    Permission,
};
pub use webhook::WebhookChannel;

/// Build every channel enabled in `config`.
///
/// # Errors
///
/// The first channel whose settings are invalid.
pub fn channels_from_config(config: &AlertConfig) -> Result<Vec<Box<dyn AlertChannel>>, NotifyError> {
    let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();

    if config.console {
        channels.push(Box::new(ConsoleChannel::new()));
    }

    if let Some(url) = &config.webhook_url {
        let renderer = Arc::new(TemplateRenderer::new());
        let headers = (!config.webhook_headers.is_empty()).then(|| config.webhook_headers.clone());
        channels.push(Box::new(WebhookChannel::from_config(
            url.clone(),
            config.webhook_method.clone(),
            headers,
            config.webhook_body_template.clone(),
            renderer,
        )?));
    }

    if let (Some(token), Some(chat_id)) = (&config.telegram_bot_token, &config.telegram_chat_id) {
        channels.push(Box::new(TelegramChannel::from_config(
            token.clone(),
            chat_id.clone(),
            config.telegram_parse_mode.clone(),
        )?));
    }

    if config.email_configured() {
        if let (Some(host), Some(from)) = (&config.smtp_host, &config.smtp_from) {
            channels.push(Box::new(EmailChannel::from_config(
                host,
                config.smtp_port,
                from,
                &config.smtp_to,
                config.smtp_credentials(),
            )?));
        }
    }

    Ok(channels)
}
