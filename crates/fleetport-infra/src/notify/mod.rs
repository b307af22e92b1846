//! User notifications
//!
//! Sends a short status message about a finished job to an external
//! notification service. Delivery is best-effort: only a missing endpoint is
//! an error, transport problems are reported as [`DeliveryStatus::Failed`].

mod http;

pub use http::HttpNotifier;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification service is not configured: {0}")]
    Configuration(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The endpoint was unreachable or answered with a non-2xx status.
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        email: &str,
        message: &str,
        file_name: Option<&str>,
    ) -> Result<DeliveryStatus, NotifyError>;
}
