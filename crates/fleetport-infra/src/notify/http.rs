use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{DeliveryStatus, Notifier, NotifyError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationBody<'a> {
    email: &'a str,
    message: &'a str,
    file_name: Option<&'a str>,
}

/// Posts notifications as JSON to the configured service.
#[derive(Clone)]
pub struct HttpNotifier {
    http_client: Client,
    endpoint: Option<String>,
}

impl HttpNotifier {
    pub fn new(endpoint: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client for notifications")?;

        Ok(Self {
            http_client,
            endpoint: endpoint.filter(|url| !url.trim().is_empty()),
        })
    }

    async fn send(&self, endpoint: &str, body: &NotificationBody<'_>) -> Result<()> {
        let response = self
            .http_client
            .post(endpoint)
            .header("User-Agent", "Fleetport-Notifier/1.0")
            .json(body)
            .send()
            .await
            .context("Failed to send notification request")?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let response_body = response.text().await.unwrap_or_default();
            Err(anyhow::anyhow!(
                "Notification service returned non-2xx status: {} - {}",
                status.as_u16(),
                response_body
            ))
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    #[tracing::instrument(skip(self, message))]
    async fn notify(
        &self,
        email: &str,
        message: &str,
        file_name: Option<&str>,
    ) -> Result<DeliveryStatus, NotifyError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| {
            NotifyError::Configuration("NOTIFICATION_SERVICE_URL is not set".to_string())
        })?;

        let body = NotificationBody {
            email,
            message,
            file_name,
        };

        match self.send(endpoint, &body).await {
            Ok(()) => {
                tracing::info!(email = %email, "Notification delivered");
                Ok(DeliveryStatus::Delivered)
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Notification delivery failed");
                Ok(DeliveryStatus::Failed(e.to_string()))
            }
        }
    }
}
