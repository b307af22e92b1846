//! Job queue: submission, worker pool, retry and dispatch.
//!
//! Shutdown: [`JobQueue::shutdown`] stops the pool from claiming new jobs, then
//! waits (bounded) for running jobs to finish. Anything still running when the
//! process dies is released by the stale-job reaper of the next worker pool.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::{sleep, timeout, MissedTickBehavior};
use uuid::Uuid;

use fleetport_core::is_unrecoverable;
use fleetport_core::models::{JobEnvelope, JobHandle, JobPayload, JobStatus};

use crate::context::JobHandlerContext;
use crate::transport::JobTransport;

/// Upper bound on the delay before a failed job is redelivered.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Exponential backoff in seconds for the given delivery count, capped.
#[inline]
pub(crate) fn compute_retry_backoff_seconds(attempts: i32, cap: u64) -> u64 {
    2_u64
        .saturating_pow(attempts.max(0) as u32)
        .min(cap)
}

/// Reports each job's terminal status. Used by tests and by anything that
/// wants to follow job completion without polling.
pub type JobFinishedSender = mpsc::Sender<(Uuid, JobStatus)>;

#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    /// Deliveries per job, the first one included.
    pub max_attempts: i32,
    pub max_retry_backoff_secs: u64,
    pub shutdown_timeout_secs: u64,
    /// Running jobs claimed longer ago than this are released by the reaper.
    pub stale_after_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            max_attempts: 3,
            max_retry_backoff_secs: MAX_RETRY_BACKOFF_SECS,
            shutdown_timeout_secs: 30,
            stale_after_secs: 900,
            reap_interval_secs: 60,
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    transport: Arc<dyn JobTransport>,
    config: JobQueueConfig,
    wake: Arc<Notify>,
    /// One permit per worker; shared with the pool so shutdown can drain it.
    workers: Arc<Semaphore>,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create a queue and spawn its worker pool.
    ///
    /// The pool wakes on every enqueue made through this queue (or its clones)
    /// and otherwise polls the transport every `poll_interval_ms`.
    pub fn new(
        transport: Arc<dyn JobTransport>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        finished_tx: Option<JobFinishedSender>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let wake = Arc::new(Notify::new());
        let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));

        let transport_clone = transport.clone();
        let config_clone = config.clone();
        let wake_clone = wake.clone();
        let workers_clone = workers.clone();

        tokio::spawn(async move {
            Self::worker_pool(
                transport_clone,
                config_clone,
                context,
                wake_clone,
                workers_clone,
                shutdown_rx,
                finished_tx,
            )
            .await;
        });

        Self {
            transport,
            config,
            wake,
            workers,
            shutdown_tx,
        }
    }

    /// Enqueue a typed job. Fails if the payload has no notification email.
    #[tracing::instrument(skip(self, payload), fields(job.kind = %P::kind()))]
    pub async fn enqueue<P: JobPayload>(&self, payload: &P) -> Result<JobHandle> {
        if payload.notify_email().trim().is_empty() {
            bail!("Job of kind {} has no notification email", P::kind());
        }

        let value = serde_json::to_value(payload).context("Failed to serialize job payload")?;
        let id = self.enqueue_raw(&P::kind().to_string(), value).await?;

        Ok(JobHandle {
            id,
            kind: P::kind(),
        })
    }

    /// Enqueue an arbitrary kind. Kinds no handler knows are dropped by the
    /// worker when claimed.
    #[tracing::instrument(skip(self, payload))]
    pub async fn enqueue_raw(&self, kind: &str, payload: serde_json::Value) -> Result<Uuid> {
        let job = self
            .transport
            .push(kind, payload, self.config.max_attempts)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, kind = %kind, "Failed to push job to transport");
                anyhow!("Failed to push job to transport: {}", e)
            })?;

        self.wake.notify_one();

        tracing::info!(job_id = %job.id, kind = %kind, "Job submitted to queue");

        Ok(job.id)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<JobEnvelope>> {
        self.transport.get(id).await
    }

    async fn worker_pool(
        transport: Arc<dyn JobTransport>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        wake: Arc<Notify>,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: mpsc::Receiver<()>,
        finished_tx: Option<JobFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            max_attempts = config.max_attempts,
            "Job queue worker pool started"
        );

        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let stale_after = chrono::Duration::seconds(config.stale_after_secs as i64);
        // First tick fires immediately, so jobs abandoned by a previous process
        // are released on startup.
        let mut reap_interval = tokio::time::interval(Duration::from_secs(config.reap_interval_secs.max(1)));
        reap_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                _ = reap_interval.tick() => {
                    match transport.reap_stale(Utc::now() - stale_after).await {
                        Ok(0) => {}
                        Ok(reaped) => {
                            tracing::warn!(reaped, "Released stale running jobs");
                            Self::claim_and_dispatch(&transport, &config, &semaphore, &context, &finished_tx).await;
                        }
                        Err(e) => tracing::error!(error = %e, "Stale job reaper failed"),
                    }
                }
                _ = wake.notified() => {
                    Self::claim_and_dispatch(&transport, &config, &semaphore, &context, &finished_tx).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch(&transport, &config, &semaphore, &context, &finished_tx).await;
                }
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    /// Claims jobs until the transport is empty or every worker is busy.
    async fn claim_and_dispatch(
        transport: &Arc<dyn JobTransport>,
        config: &JobQueueConfig,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn JobHandlerContext>,
        finished_tx: &Option<JobFinishedSender>,
    ) {
        loop {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::debug!("No workers available, skipping claim");
                    return;
                }
            };

            match transport.claim_next().await {
                Ok(Some(job)) => {
                    let transport = transport.clone();
                    let config = config.clone();
                    let ctx = context.clone();
                    let finished_tx = finished_tx.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) =
                            Self::process_job(job, transport, config, ctx, finished_tx).await
                        {
                            tracing::error!(error = %e, "Job processing failed");
                        }
                    });
                }
                Ok(None) => {
                    tracing::trace!("No jobs available in queue");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job from transport");
                    return;
                }
            }
        }
    }

    #[tracing::instrument(skip_all, fields(job.id = %job.id, job.kind = %job.kind, job.attempts = job.attempts))]
    async fn process_job(
        job: JobEnvelope,
        transport: Arc<dyn JobTransport>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        finished_tx: Option<JobFinishedSender>,
    ) -> Result<()> {
        let decoded = match job.decode() {
            Ok(decoded) => decoded,
            Err(e) if e.is_unknown_kind() => {
                tracing::warn!(job_id = %job.id, kind = %job.kind, "Unknown job kind, dropping job");
                transport
                    .drop_job(job.id, json!({ "reason": e.to_string() }))
                    .await
                    .context("Failed to mark job as dropped")?;
                Self::report(&finished_tx, job.id, JobStatus::Dropped).await;
                return Ok(());
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Job payload rejected, will not retry");
                transport
                    .fail(
                        job.id,
                        json!({ "error": e.to_string(), "attempts": job.attempts, "unrecoverable": true }),
                    )
                    .await
                    .context("Failed to mark job as failed")?;
                Self::report(&finished_tx, job.id, JobStatus::Failed).await;
                return Err(e.into());
            }
        };

        let Some(ctx) = context.upgrade() else {
            transport
                .retry_at(job.id, Utc::now(), json!({ "error": "worker context unavailable" }))
                .await?;
            return Err(anyhow!("JobHandlerContext was dropped, cannot process job"));
        };

        match ctx.dispatch_job(decoded).await {
            Ok(result) => {
                transport
                    .complete(job.id, result)
                    .await
                    .context("Failed to mark job as completed")?;
                Self::report(&finished_tx, job.id, JobStatus::Completed).await;
                tracing::info!(job_id = %job.id, kind = %job.kind, "Job completed successfully");
                Ok(())
            }
            Err(e) => {
                let unrecoverable = is_unrecoverable(&e);

                tracing::error!(
                    job_id = %job.id,
                    error = %e,
                    attempts = job.attempts,
                    max_attempts = job.max_attempts,
                    unrecoverable = unrecoverable,
                    "Job execution failed"
                );

                if unrecoverable {
                    transport
                        .fail(
                            job.id,
                            json!({ "error": e.to_string(), "attempts": job.attempts, "unrecoverable": true }),
                        )
                        .await
                        .context("Failed to mark job as failed")?;
                    Self::report(&finished_tx, job.id, JobStatus::Failed).await;
                    tracing::error!(job_id = %job.id, "Job failed with unrecoverable error, will not retry");
                    return Err(e);
                }

                if job.can_retry() {
                    let backoff_seconds =
                        compute_retry_backoff_seconds(job.attempts, config.max_retry_backoff_secs);
                    let run_at = Utc::now() + chrono::Duration::seconds(backoff_seconds as i64);
                    tracing::info!(
                        job_id = %job.id,
                        next_attempt = job.attempts + 1,
                        backoff_seconds = backoff_seconds,
                        "Scheduling job retry"
                    );
                    transport
                        .retry_at(job.id, run_at, json!({ "error": e.to_string(), "attempts": job.attempts }))
                        .await
                        .context("Failed to reschedule job")?;
                    Ok(())
                } else {
                    transport
                        .fail(
                            job.id,
                            json!({
                                "error": e.to_string(),
                                "attempts": job.attempts,
                                "reason": "Job failed after maximum attempts"
                            }),
                        )
                        .await
                        .context("Failed to mark job as failed")?;
                    Self::report(&finished_tx, job.id, JobStatus::Failed).await;
                    tracing::error!(job_id = %job.id, "Job failed after max attempts");
                    Err(e)
                }
            }
        }
    }

    async fn report(finished_tx: &Option<JobFinishedSender>, id: Uuid, status: JobStatus) {
        if let Some(tx) = finished_tx {
            let _ = tx.send((id, status)).await;
        }
    }

    /// Stops the worker pool from claiming, then waits up to
    /// `shutdown_timeout_secs` for running jobs to finish.
    ///
    /// Returns `true` when every worker went idle in time.
    pub async fn shutdown(&self) -> bool {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;

        let all_workers = self.config.max_workers.max(1) as u32;
        let wait = Duration::from_secs(self.config.shutdown_timeout_secs);
        match timeout(wait, self.workers.acquire_many(all_workers)).await {
            Ok(Ok(_permits)) => {
                tracing::info!("All running jobs finished");
                true
            }
            Ok(Err(_)) => true,
            Err(_) => {
                let running = all_workers as usize - self.workers.available_permits();
                tracing::warn!(
                    running,
                    timeout_secs = self.config.shutdown_timeout_secs,
                    "Shutdown timed out with jobs still running; they will be released as stale"
                );
                false
            }
        }
    }
}
