//! Outbound notification mail via an HTTP relay.
//! Fire-and-forget from callers' point of view: the sweeper logs failures
//! and moves on, so this client does not retry.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::events::{Notifier, NotifyError};

pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    /// Create a new client. Reads `MAIL_API_KEY` from the environment.
    pub fn new(api_url: impl Into<String>, from: impl Into<String>) -> Result<Self, NotifyError> {
        let api_key = std::env::var("MAIL_API_KEY").map_err(|_| {
            NotifyError::Api("MAIL_API_KEY environment variable not set".into())
        })?;

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Api(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key,
            from: from.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send_notification(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": recipient,
            "subject": subject,
            "text": body,
        });

        let result = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(recipient, subject, "notification sent");
                Ok(())
            }
            Ok(resp) => {
                let status = resp.status();
                let body_text = resp.text().await.unwrap_or_default();
                Err(NotifyError::Api(format!(
                    "unexpected status {}: {}",
                    status,
                    body_text.chars().take(200).collect::<String>()
                )))
            }
            Err(e) if e.is_timeout() => Err(NotifyError::Timeout),
            Err(e) => Err(NotifyError::Api(e.to_string())),
        }
    }
}

/// Stand-in used when the mail relay is not configured. Events still get
/// retired; the would-be notification is only logged.
pub struct DisabledNotifier;

impl DisabledNotifier {
    pub fn new() -> Self {
        info!("mail relay not configured, event notifications disabled");
        Self
    }
}

impl Default for DisabledNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_notification(
        &self,
        recipient: &str,
        subject: &str,
        _body: &str,
    ) -> Result<(), NotifyError> {
        debug!(recipient, subject, "notification skipped (mail disabled)");
        Ok(())
    }
}
