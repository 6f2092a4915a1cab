use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use enrollment_core::notify::{DeliveryError, NotificationCollaborator};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Posts `{recipient, subject, body, sender}` as JSON to a mail relay webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    sender: String,
    api_token: Option<SecretString>,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    sender: &'a str,
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        sender: impl Into<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build notification http client")?;
        Ok(Self { client, url: url.into(), sender: sender.into(), api_token })
    }
}

#[async_trait]
impl NotificationCollaborator for WebhookNotifier {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if self.sender.trim().is_empty() {
            return Err(DeliveryError::MissingCredentials("sender address is empty".to_owned()));
        }

        let mut request = self.client.post(&self.url).json(&WebhookPayload {
            sender: &self.sender,
            recipient,
            subject,
            body,
        });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| DeliveryError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(
                event_name = "notification.delivered",
                recipient,
                status = status.as_u16(),
                "confirmation delivered"
            );
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default().chars().take(200).collect();
        tracing::warn!(
            event_name = "notification.rejected",
            recipient,
            status = status.as_u16(),
            "notification endpoint rejected delivery"
        );
        Err(DeliveryError::Rejected { status: status.as_u16(), message })
    }
}

/// Delivery stand-in used when notification is disabled. Logs the message and
/// reports [`DeliveryError::Disabled`] so nothing claims it was sent.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationCollaborator for LogNotifier {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            event_name = "notification.skipped",
            recipient,
            subject,
            body_len = body.len(),
            "notification disabled, confirmation logged only"
        );
        Err(DeliveryError::Disabled)
    }
}

/// Records deliveries in memory; optionally fails every delivery.
#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    delivered: Arc<Mutex<Vec<OutboundMessage>>>,
    failure: Option<DeliveryError>,
}

impl InMemoryNotifier {
    pub fn failing(error: DeliveryError) -> Self {
        Self { delivered: Arc::default(), failure: Some(error) }
    }

    pub fn delivered(&self) -> Vec<OutboundMessage> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl NotificationCollaborator for InMemoryNotifier {
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let message = OutboundMessage {
            recipient: recipient.to_owned(),
            subject: subject.to_owned(),
            body: body.to_owned(),
        };
        match self.delivered.lock() {
            Ok(mut delivered) => delivered.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use enrollment_core::notify::{DeliveryError, NotificationCollaborator};

    use super::{InMemoryNotifier, LogNotifier, WebhookNotifier};

    #[tokio::test]
    async fn log_notifier_never_reports_a_send() {
        let error = LogNotifier.deliver("anna@example.org", "s", "b").await.expect_err("disabled");

        assert_eq!(error, DeliveryError::Disabled);
    }

    #[tokio::test]
    async fn in_memory_notifier_records_messages() {
        let notifier = InMemoryNotifier::default();

        notifier.deliver("anna@example.org", "Subject", "Body").await.expect("deliver");

        let delivered = notifier.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient, "anna@example.org");
    }

    #[tokio::test]
    async fn failing_notifier_reports_without_recording() {
        let notifier = InMemoryNotifier::failing(DeliveryError::Transport("down".to_owned()));

        let error = notifier.deliver("anna@example.org", "s", "b").await.expect_err("fails");

        assert_eq!(error, DeliveryError::Transport("down".to_owned()));
        assert!(notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn webhook_without_sender_reports_missing_credentials() {
        let notifier =
            WebhookNotifier::new("http://127.0.0.1:9/hook", " ", None, Duration::from_secs(1))
                .expect("client");

        let error = notifier.deliver("anna@example.org", "s", "b").await.expect_err("no sender");

        assert!(matches!(error, DeliveryError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_a_transport_failure() {
        let notifier = WebhookNotifier::new(
            "http://127.0.0.1:9/hook",
            "segreteria@example.org",
            None,
            Duration::from_millis(500),
        )
        .expect("client");

        let error = notifier.deliver("anna@example.org", "s", "b").await.expect_err("refused");

        assert!(matches!(error, DeliveryError::Transport(_)));
    }
}
