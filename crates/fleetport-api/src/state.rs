//! Application state shared by every handler.

use fleetport_core::Config;
use fleetport_services::VehicleService;
use fleetport_storage::TransferStore;
use fleetport_worker::{JobHandlerContext, JobQueue};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AppState {
    pub config: Config,
    /// `None` when running on the in-memory store.
    pub db_pool: Option<PgPool>,
    pub vehicles: VehicleService,
    pub files: Arc<TransferStore>,
    pub queue: JobQueue,
    /// The worker pool only holds a weak reference; this keeps the handler alive.
    pub job_handler: Arc<dyn JobHandlerContext>,
    pub sweeper: Option<JoinHandle<()>>,
}

impl AppState {
    /// Stops the sweeper, then stops the worker pool and waits for running
    /// jobs to finish.
    pub async fn shutdown(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
            tracing::info!("Retention sweeper stopped");
        }

        self.queue.shutdown().await;
    }
}
