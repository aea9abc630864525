//! Best-effort push delivery for stored notifications
//!
//! The notification row is already committed when delivery runs; a failed
//! push is logged and dropped, never retried and never rolled back.

use async_trait::async_trait;

use crate::domain::Notification;

#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    async fn push(&self, notification: &Notification);
}

/// No live channel configured
pub struct NoopDelivery;

#[async_trait]
impl NotificationDelivery for NoopDelivery {
    async fn push(&self, _notification: &Notification) {}
}

/// POSTs each notification as JSON to a webhook endpoint
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
}

impl WebhookDelivery {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationDelivery for WebhookDelivery {
    async fn push(&self, notification: &Notification) {
        match self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
        {
            Ok(res) if res.status().is_success() => {
                tracing::debug!(id = notification.id, "notification pushed");
            }
            Ok(res) => {
                tracing::warn!(
                    id = notification.id,
                    status = %res.status(),
                    "push endpoint rejected notification"
                );
            }
            Err(e) => {
                tracing::warn!(id = notification.id, "failed to push notification: {}", e);
            }
        }
    }
}
