use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("notification credentials missing: {0}")]
    MissingCredentials(String),
    #[error("notification endpoint rejected delivery with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("notification transport failure: {0}")]
    Transport(String),
    #[error("notification delivery is disabled")]
    Disabled,
}

/// Outbound channel for confirmation summaries. Failures are reported to the
/// caller and never retried here.
#[async_trait]
pub trait NotificationCollaborator: Send + Sync {
    async fn deliver(&self, recipient: &str, subject: &str, body: &str)
        -> Result<(), DeliveryError>;
}

#[async_trait]
impl<N> NotificationCollaborator for Arc<N>
where
    N: NotificationCollaborator + ?Sized,
{
    async fn deliver(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        (**self).deliver(recipient, subject, body).await
    }
}
