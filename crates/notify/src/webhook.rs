//! HTTP webhook alert channel.
//!
//! Posts each alert to a configured URL, either as the JSON-serialized
//! [`Notification`] or as the output of a body template rendered against it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::templating::TemplateRenderer;
use crate::traits::{AlertChannel, Notification, NotifyError, Permission};

/// Delivers alerts over HTTP to a configured endpoint.
///
/// `${VAR_NAME}` references in the URL and header values are resolved from
/// the environment at construction time.
#[derive(Debug)]
pub struct WebhookChannel {
    url: String,
    method: reqwest::Method,
    headers: HashMap<String, String>,
    /// When set, rendered with the notification as context and sent as the
    /// request body instead of the JSON payload.
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// # Errors
    ///
    /// [`NotifyError::Config`] for unresolvable env references, an unknown
    /// HTTP method, or a body template that does not parse.
    pub fn from_config(
        url: String,
        method: Option<String>,
        headers: Option<HashMap<String, String>>,
        body_template: Option<String>,
        renderer: Arc<TemplateRenderer>,
    ) -> Result<Self, NotifyError> {
        let method = match method {
            Some(m) => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            None => reqwest::Method::POST,
        };

        let headers = headers
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| resolve_env_vars(&v).map(|v| (k, v)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        if let Some(ref tmpl) = body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        Ok(Self {
            url: resolve_env_vars(&url)?,
            method,
            headers,
            body_template,
            renderer,
            client: reqwest::Client::new(),
        })
    }

    fn request_body(&self, notification: &Notification) -> Result<(String, &'static str), NotifyError> {
        match &self.body_template {
            Some(tmpl) => Ok((self.renderer.render(tmpl, notification)?, "text/plain; charset=utf-8")),
            None => serde_json::to_string(notification)
                .map(|b| (b, "application/json"))
                .map_err(|e| NotifyError::Config(format!("failed to serialize alert: {e}"))),
        }
    }
}

#[async_trait::async_trait]
impl AlertChannel for WebhookChannel {
    /// Only `http` and `https` targets are supported.
    async fn request_permission(&self) -> Permission {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            Permission::Granted
        } else {
            Permission::Unsupported
        }
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let (body, content_type) = self.request_body(notification)?;

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Config(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(url = %self.url, method = %self.method, %status, "webhook alert delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("${") {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unclosed env var reference in: {input}"))
        })?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("env var not found: {name}")))?;
        result.push_str(&value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}
