//! SMTP email alert channel via `lettre`.

use crate::traits::{AlertChannel, Notification, NotifyError};
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Sends alerts as plain-text emails, e.g. to the technicians' team inbox.
#[derive(Debug)]
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    authenticated: bool,
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("{addr}: {e}")))
}

impl EmailChannel {
    /// Build an email channel from SMTP settings.
    ///
    /// Port 465 uses implicit TLS, any other port STARTTLS. `credentials` is
    /// a `(username, password)` login; without it the relay is used
    /// unauthenticated.
    pub fn from_config(
        smtp_host: &str,
        smtp_port: Option<u16>,
        from: &str,
        to: &[String],
        credentials: Option<(&str, &str)>,
    ) -> Result<Self, NotifyError> {
        let from = parse_mailbox(from)?;
        let to = to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;

        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let port = smtp_port.unwrap_or(587);
        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
        }
        .map_err(|e| NotifyError::Config(e.to_string()))?
        .port(port);

        let authenticated = credentials.is_some();
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username.to_string(), password.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            authenticated,
        })
    }
}

#[async_trait::async_trait]
impl AlertChannel for EmailChannel {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut message_builder = Message::builder().from(self.from.clone());
        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }

        let email = message_builder
            .subject(&notification.subject)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::debug!(
            recipients = self.to.len(),
            authenticated = self.authenticated,
            "email alert sent"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config() {
        let ch = EmailChannel::from_config(
            "smtp.example.com",
            Some(587),
            "Fixwatch <alerts@example.com>",
            &["techs@example.com".to_string()],
            None,
        )
        .unwrap();
        assert_eq!(ch.channel_name(), "email");
        assert_eq!(ch.from.email.to_string(), "alerts@example.com");
        assert!(!ch.authenticated);
    }

    #[test]
    fn credentials_enable_auth() {
        let ch = EmailChannel::from_config(
            "smtp.example.com",
            Some(587),
            "alerts@example.com",
            &["techs@example.com".to_string()],
            Some(("ops@example.com", "app-password")),
        )
        .unwrap();
        assert!(ch.authenticated);
    }

    #[test]
    fn implicit_tls_port() {
        assert!(EmailChannel::from_config(
            "smtp.example.com",
            Some(465),
            "alerts@example.com",
            &["techs@example.com".to_string()],
            None,
        )
        .is_ok());
    }

    #[test]
    fn invalid_addresses_rejected() {
        let err = EmailChannel::from_config("smtp.example.com", None, "bad-address", &["a@example.com".into()], None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("Configuration error"), "got: {err}");
        assert!(EmailChannel::from_config("smtp.example.com", None, "a@example.com", &["nope".into()], None).is_err());
    }

    #[test]
    fn empty_recipients_rejected() {
        let err = EmailChannel::from_config("smtp.example.com", None, "alerts@example.com", &[], None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("at least one recipient"), "got: {err}");
    }
}
