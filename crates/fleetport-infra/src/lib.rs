//! Fleetport Infrastructure Library
//!
//! Shared infrastructure used by the services and the API binary:
//! - Telemetry initialization
//! - Outbound user notifications

pub mod notify;
pub mod telemetry;

pub use notify::{DeliveryStatus, HttpNotifier, Notifier, NotifyError};
pub use telemetry::{init_telemetry, shutdown_telemetry};
