//! Job handler context trait
//!
//! The worker calls `dispatch_job` with a decoded [`Job`]; the implementation
//! matches on the variant and runs the corresponding pipeline.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use fleetport_core::models::Job;

/// The worker holds a weak reference so the application state that owns the
/// queue can also own the context without a reference cycle.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Run the job and return a JSON summary stored as the job result.
    ///
    /// Errors wrapping an unrecoverable `JobError` fail the job immediately;
    /// all other errors are redelivered while attempts remain.
    async fn dispatch_job(self: Arc<Self>, job: Job) -> Result<serde_json::Value>;
}
