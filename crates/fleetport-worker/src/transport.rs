//! Job transports: where enqueued jobs live until a worker claims them.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use fleetport_core::models::{JobEnvelope, JobStatus};
use fleetport_db::JobRepository;

/// How long the in-memory transport keeps completed, failed and dropped jobs.
pub const FINISHED_JOB_TTL_SECS: i64 = 3600;

/// Durable (or process-local) storage for jobs.
///
/// `claim_next` must hand each due pending job to exactly one caller and
/// count the delivery in `attempts`.
#[async_trait]
pub trait JobTransport: Send + Sync {
    async fn push(&self, kind: &str, payload: Value, max_attempts: i32) -> Result<JobEnvelope>;

    async fn claim_next(&self) -> Result<Option<JobEnvelope>>;

    async fn complete(&self, id: Uuid, result: Value) -> Result<()>;

    async fn fail(&self, id: Uuid, error: Value) -> Result<()>;

    async fn drop_job(&self, id: Uuid, reason: Value) -> Result<()>;

    async fn retry_at(&self, id: Uuid, run_at: DateTime<Utc>, error: Value) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<JobEnvelope>>;

    /// Releases jobs that have been `running` since before `claimed_before`:
    /// back to `pending` while deliveries remain, otherwise `failed`.
    async fn reap_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64>;
}

/// Postgres transport backed by the `jobs` table.
#[derive(Clone)]
pub struct PgJobTransport {
    repository: JobRepository,
}

impl PgJobTransport {
    pub fn new(repository: JobRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl JobTransport for PgJobTransport {
    async fn push(&self, kind: &str, payload: Value, max_attempts: i32) -> Result<JobEnvelope> {
        self.repository
            .create_job(kind, payload, max_attempts)
            .await
    }

    async fn claim_next(&self) -> Result<Option<JobEnvelope>> {
        self.repository.claim_next_job().await
    }

    async fn complete(&self, id: Uuid, result: Value) -> Result<()> {
        self.repository.mark_completed(id, result).await
    }

    async fn fail(&self, id: Uuid, error: Value) -> Result<()> {
        self.repository.mark_failed(id, error).await
    }

    async fn drop_job(&self, id: Uuid, reason: Value) -> Result<()> {
        self.repository.mark_dropped(id, reason).await
    }

    async fn retry_at(&self, id: Uuid, run_at: DateTime<Utc>, error: Value) -> Result<()> {
        self.repository.reschedule(id, run_at, error).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobEnvelope>> {
        self.repository.get_job(id).await
    }

    async fn reap_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        self.repository.reap_stale_running_jobs(claimed_before).await
    }
}

/// In-process transport used when no database is configured, and in tests.
/// Jobs are lost on restart. Finished jobs stay readable for
/// [`FINISHED_JOB_TTL_SECS`] and are pruned on the next push after that.
pub struct MemoryJobTransport {
    jobs: Mutex<HashMap<Uuid, JobEnvelope>>,
    finished_ttl: chrono::Duration,
}

impl Default for MemoryJobTransport {
    fn default() -> Self {
        Self::with_finished_ttl(chrono::Duration::seconds(FINISHED_JOB_TTL_SECS))
    }
}

impl MemoryJobTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_finished_ttl(finished_ttl: chrono::Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            finished_ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JobEnvelope>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition<F>(&self, id: Uuid, apply: F) -> Result<()>
    where
        F: FnOnce(&mut JobEnvelope),
    {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Job not found: {}", id))?;
        apply(job);
        job.updated_at = Utc::now();
        Ok(())
    }

    fn finish(&self, id: Uuid, status: JobStatus, result: Value) -> Result<()> {
        self.transition(id, |job| {
            job.status = status;
            job.result = Some(result);
            job.completed_at = Some(Utc::now());
        })
    }
}

#[async_trait]
impl JobTransport for MemoryJobTransport {
    async fn push(&self, kind: &str, payload: Value, max_attempts: i32) -> Result<JobEnvelope> {
        let now = Utc::now();
        let job = JobEnvelope {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            status: JobStatus::Pending,
            payload,
            result: None,
            attempts: 0,
            max_attempts,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let expired_before = now - self.finished_ttl;
        let mut jobs = self.lock();
        jobs.retain(|_, j| match j.completed_at {
            Some(done) if j.status.is_terminal() => done >= expired_before,
            _ => true,
        });
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_next(&self) -> Result<Option<JobEnvelope>> {
        let now = Utc::now();
        let mut jobs = self.lock();

        let next_id = jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending && j.scheduled_at <= now)
            .min_by_key(|j| (j.scheduled_at, j.created_at))
            .map(|j| j.id);

        let Some(id) = next_id else {
            return Ok(None);
        };

        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| anyhow!("Job vanished while claiming: {}", id))?;
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.started_at = Some(now);
        job.updated_at = now;

        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: Uuid, result: Value) -> Result<()> {
        self.finish(id, JobStatus::Completed, result)
    }

    async fn fail(&self, id: Uuid, error: Value) -> Result<()> {
        self.finish(id, JobStatus::Failed, error)
    }

    async fn drop_job(&self, id: Uuid, reason: Value) -> Result<()> {
        self.finish(id, JobStatus::Dropped, reason)
    }

    async fn retry_at(&self, id: Uuid, run_at: DateTime<Utc>, error: Value) -> Result<()> {
        self.transition(id, |job| {
            job.status = JobStatus::Pending;
            job.scheduled_at = run_at;
            job.result = Some(error);
            job.started_at = None;
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<JobEnvelope>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn reap_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let now = Utc::now();
        let mut reaped = 0;
        for job in self.lock().values_mut() {
            let stale = job.status == JobStatus::Running
                && job.started_at.is_some_and(|started| started < claimed_before);
            if !stale {
                continue;
            }
            if job.can_retry() {
                job.status = JobStatus::Pending;
                job.scheduled_at = now;
            } else {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now);
            }
            job.started_at = None;
            job.result = Some(serde_json::json!({ "error": "worker stopped before the job finished" }));
            job.updated_at = now;
            reaped += 1;
        }
        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn claims_in_fifo_order_and_only_once() {
        let transport = MemoryJobTransport::new();
        let first = transport.push("a", json!({}), 3).await.unwrap();
        let second = transport.push("b", json!({}), 3).await.unwrap();

        let claimed = transport.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.status, JobStatus::Running);

        let claimed = transport.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, second.id);

        assert!(transport.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rescheduled_job_waits_until_due() {
        let transport = MemoryJobTransport::new();
        let job = transport.push("a", json!({}), 3).await.unwrap();
        transport.claim_next().await.unwrap();

        transport
            .retry_at(job.id, Utc::now() + Duration::seconds(60), json!({ "error": "boom" }))
            .await
            .unwrap();
        assert!(transport.claim_next().await.unwrap().is_none());

        transport
            .retry_at(job.id, Utc::now(), json!({ "error": "boom" }))
            .await
            .unwrap();
        let again = transport.claim_next().await.unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn finished_jobs_are_not_claimed() {
        let transport = MemoryJobTransport::new();
        let job = transport.push("a", json!({}), 3).await.unwrap();
        transport.claim_next().await.unwrap();
        transport.drop_job(job.id, json!({})).await.unwrap();

        let stored = transport.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Dropped);
        assert!(stored.completed_at.is_some());
        assert!(transport.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_running_job_is_released() {
        let transport = MemoryJobTransport::new();
        let job = transport.push("a", json!({}), 3).await.unwrap();
        transport.claim_next().await.unwrap();

        assert_eq!(transport.reap_stale(Utc::now() - Duration::seconds(60)).await.unwrap(), 0);
        assert_eq!(transport.reap_stale(Utc::now() + Duration::seconds(1)).await.unwrap(), 1);

        let stored = transport.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        let again = transport.claim_next().await.unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn stale_job_out_of_attempts_is_failed() {
        let transport = MemoryJobTransport::new();
        let job = transport.push("a", json!({}), 1).await.unwrap();
        transport.claim_next().await.unwrap();

        transport.reap_stale(Utc::now() + Duration::seconds(1)).await.unwrap();

        let stored = transport.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(transport.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_finished_jobs_are_pruned_on_push() {
        let transport = MemoryJobTransport::with_finished_ttl(Duration::zero());
        let done = transport.push("a", json!({}), 3).await.unwrap();
        let waiting = transport.push("b", json!({}), 3).await.unwrap();
        let claimed = transport.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.id, done.id);
        transport.complete(done.id, json!({})).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        transport.push("c", json!({}), 3).await.unwrap();

        assert!(transport.get(done.id).await.unwrap().is_none());
        assert!(transport.get(waiting.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_job_id_is_an_error() {
        let transport = MemoryJobTransport::new();
        assert!(transport.complete(Uuid::new_v4(), json!({})).await.is_err());
    }
}
