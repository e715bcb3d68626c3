use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use tracing::debug;

use crate::domains::push::PushSubscription;
use crate::kernel::traits::{BasePushSender, NotificationPayload, PushError};

/// HTTP push sender: POSTs the JSON payload to the subscription endpoint.
/// 404/410 responses mean the endpoint is permanently gone and the
/// subscription should be pruned.
pub struct HttpPushSender {
    client: Client,
}

impl HttpPushSender {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpPushSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePushSender for HttpPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        debug!(endpoint = %subscription.endpoint, tag = %payload.tag, "Sending push notification");

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .json(payload)
            .send()
            .await
            .map_err(|e| PushError::Other(e.into()))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushError::Gone),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(PushError::Other(anyhow::anyhow!(
                    "push endpoint returned {}: {}",
                    s,
                    body
                )))
            }
        }
    }
}
