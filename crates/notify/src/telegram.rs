//! Telegram Bot API alert channel.
//!
//! Delivers alerts via the `sendMessage` endpoint, optionally with
//! MarkdownV2 formatting, and reports HTTP 429 as [`NotifyError::RateLimited`].

use crate::traits::{AlertChannel, Notification, NotifyError};

/// Escapes special characters for Telegram MarkdownV2 parse mode.
pub fn escape_markdown_v2(text: &str) -> String {
    const SPECIAL: [char; 18] = [
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut result = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            result.push('\\');
        }
        result.push(ch);
    }
    result
}

#[derive(Debug)]
pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    parse_mode: Option<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    /// A `bot_token` of the form `${VAR}` is read from the environment.
    pub fn from_config(
        bot_token: String,
        chat_id: String,
        parse_mode: Option<String>,
    ) -> Result<Self, NotifyError> {
        let bot_token = match bot_token.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                NotifyError::Config(format!("Environment variable '{var_name}' is not set"))
            })?,
            None => bot_token,
        };

        if bot_token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        if chat_id.trim().is_empty() {
            return Err(NotifyError::Config(
                "Telegram chat id must not be empty".to_string(),
            ));
        }

        if let Some(mode) = parse_mode.as_deref().filter(|m| *m != "MarkdownV2") {
            return Err(NotifyError::Config(format!(
                "unsupported Telegram parse mode: {mode} (expected MarkdownV2)"
            )));
        }

        Ok(Self {
            bot_token,
            chat_id,
            parse_mode,
            client: reqwest::Client::new(),
        })
    }

    /// Message text: subject on the first line, body below.
    fn message_text(&self, notification: &Notification) -> String {
        match self.parse_mode.as_deref() {
            Some("MarkdownV2") => format!(
                "*{}*\n{}",
                escape_markdown_v2(&notification.subject),
                escape_markdown_v2(&notification.body)
            ),
            _ => format!("{}\n{}", notification.subject, notification.body),
        }
    }
}

#[async_trait::async_trait]
impl AlertChannel for TelegramChannel {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": self.message_text(notification),
        });
        if let Some(ref mode) = self.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::debug!(chat_id = %self.chat_id, "Telegram alert sent");
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");
        Err(NotifyError::Config(format!("Telegram API error: {description}")))
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
