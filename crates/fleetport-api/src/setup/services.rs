//! Service wiring and application state setup

use anyhow::{Context, Result};
use fleetport_core::Config;
use fleetport_db::{JobRepository, MemoryVehicleStore, PgVehicleStore, VehicleStore};
use fleetport_infra::{HttpNotifier, Notifier};
use fleetport_services::{
    ExportPipeline, ImportPipeline, JobRunner, RetentionSweeper, VehicleService,
};
use fleetport_storage::TransferStore;
use fleetport_worker::{
    JobHandlerContext, JobQueue, JobQueueConfig, JobTransport, MemoryJobTransport, PgJobTransport,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// The collaborators that change between a Postgres deployment, an
/// in-memory run and the integration tests.
pub struct Backends {
    pub db_pool: Option<PgPool>,
    pub store: Arc<dyn VehicleStore>,
    pub transport: Arc<dyn JobTransport>,
    pub notifier: Arc<dyn Notifier>,
}

impl Backends {
    pub fn from_config(config: &Config, pool: Option<PgPool>) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(
            config.notification_service_url.clone(),
            config.notification_timeout_seconds,
        )?);

        let backends = match pool {
            Some(pool) => Backends {
                store: Arc::new(PgVehicleStore::new(pool.clone())),
                transport: Arc::new(PgJobTransport::new(JobRepository::new(pool.clone()))),
                db_pool: Some(pool),
                notifier,
            },
            None => {
                tracing::warn!(
                    "DATABASE_URL is not set; using the in-memory vehicle store and job transport"
                );
                Backends {
                    db_pool: None,
                    store: Arc::new(MemoryVehicleStore::new()),
                    transport: Arc::new(MemoryJobTransport::new()),
                    notifier,
                }
            }
        };

        Ok(backends)
    }
}

/// Initialize all services, returning the application state
pub async fn initialize_services(config: &Config, pool: Option<PgPool>) -> Result<Arc<AppState>> {
    let backends = Backends::from_config(config, pool)?;
    build_state(config, backends).await
}

/// Wires pipelines, the job runner, the worker pool and the sweeper around
/// the given backends. Spawns background tasks, so it needs a Tokio runtime.
pub async fn build_state(config: &Config, backends: Backends) -> Result<Arc<AppState>> {
    let files = Arc::new(
        TransferStore::new(config.upload_dir.clone(), config.export_dir.clone())
            .await
            .context("Failed to prepare upload and export directories")?,
    );

    let import = ImportPipeline::new(backends.store.clone(), backends.notifier.clone());
    let export = ExportPipeline::new(
        backends.store.clone(),
        files.clone(),
        backends.notifier.clone(),
    );
    let job_handler: Arc<dyn JobHandlerContext> = Arc::new(JobRunner::new(import, export));

    let queue_config = JobQueueConfig {
        max_workers: config.job_max_workers,
        poll_interval_ms: config.job_poll_interval_ms,
        max_attempts: config.job_max_attempts,
        shutdown_timeout_secs: config.job_shutdown_timeout_seconds,
        stale_after_secs: config.job_stale_after_seconds,
        reap_interval_secs: config.job_reap_interval_seconds,
        ..JobQueueConfig::default()
    };
    tracing::info!(
        max_workers = queue_config.max_workers,
        max_attempts = queue_config.max_attempts,
        "Job queue initialized"
    );
    let queue = JobQueue::new(
        backends.transport,
        queue_config,
        Arc::downgrade(&job_handler),
        None,
    );

    let sweeper = if config.retention_enabled {
        let sweeper = Arc::new(RetentionSweeper::new(
            vec![config.upload_dir.clone(), config.export_dir.clone()],
            Duration::from_secs(config.retention_threshold_seconds),
            Duration::from_secs(config.retention_interval_seconds),
        ));
        Some(sweeper.start())
    } else {
        tracing::info!("Retention sweeper disabled");
        None
    };

    Ok(Arc::new(AppState {
        config: config.clone(),
        db_pool: backends.db_pool,
        vehicles: VehicleService::new(backends.store),
        files,
        queue,
        job_handler,
        sweeper,
    }))
}
