use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use fleetport_core::models::JobEnvelope;

/// Postgres-backed job table used as the durable queue transport.
#[derive(Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn create_job(
        &self,
        kind: &str,
        payload: serde_json::Value,
        max_attempts: i32,
    ) -> Result<JobEnvelope> {
        let job = sqlx::query_as::<Postgres, JobEnvelope>(
            r#"
            INSERT INTO jobs (kind, status, payload, max_attempts)
            VALUES ($1, 'pending', $2, $3)
            RETURNING
                id, kind, status, payload, result, attempts, max_attempts,
                scheduled_at, started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(kind)
        .bind(payload)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, kind = %kind, "Failed to insert job into database");
            anyhow::anyhow!("Failed to insert job into database: {}", e)
        })?;

        tracing::debug!(job_id = %job.id, kind = %kind, "Job inserted");

        Ok(job)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<JobEnvelope>> {
        let job = sqlx::query_as::<Postgres, JobEnvelope>(
            r#"
            SELECT
                id, kind, status, payload, result, attempts, max_attempts,
                scheduled_at, started_at, completed_at, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch job")?;

        Ok(job)
    }

    /// Claims the oldest due pending job and marks it running.
    ///
    /// Uses FOR UPDATE SKIP LOCKED so several workers (or processes) can
    /// claim concurrently without handing the same job out twice.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_job(&self) -> Result<Option<JobEnvelope>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let next_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM jobs
            WHERE status = 'pending'
                AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC, created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to fetch next job")?;

        let Some(job_id) = next_id else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        let job = sqlx::query_as::<Postgres, JobEnvelope>(
            r#"
            UPDATE jobs
            SET status = 'running',
                attempts = attempts + 1,
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id, kind, status, payload, result, attempts, max_attempts,
                scheduled_at, started_at, completed_at, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to update job status")?;

        tx.commit().await.context("Failed to commit transaction")?;

        tracing::debug!(job_id = %job.id, kind = %job.kind, attempts = job.attempts, "Job claimed");

        Ok(Some(job))
    }

    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, job_id: Uuid, result: serde_json::Value) -> Result<()> {
        self.finish(job_id, "completed", result)
            .await
            .context("Failed to mark job as completed")
    }

    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, job_id: Uuid, error: serde_json::Value) -> Result<()> {
        self.finish(job_id, "failed", error)
            .await
            .context("Failed to mark job as failed")
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn mark_dropped(&self, job_id: Uuid, reason: serde_json::Value) -> Result<()> {
        self.finish(job_id, "dropped", reason)
            .await
            .context("Failed to mark job as dropped")
    }

    /// Puts a running job back in the pending state, due at `run_at`.
    #[tracing::instrument(skip(self, error))]
    pub async fn reschedule(
        &self,
        job_id: Uuid,
        run_at: DateTime<Utc>,
        error: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                scheduled_at = $2,
                result = $3,
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(run_at)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to reschedule job")?;

        Ok(())
    }

    /// Hands back jobs left `running` by a worker that died or was stopped
    /// mid-job. Jobs with deliveries left return to `pending`; the rest are
    /// failed. Returns the number of rows touched.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_running_jobs(&self, claimed_before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts < max_attempts THEN 'pending' ELSE 'failed' END,
                scheduled_at = NOW(),
                started_at = NULL,
                completed_at = CASE WHEN attempts < max_attempts THEN NULL ELSE NOW() END,
                result = jsonb_build_object('error', 'worker stopped before the job finished'),
                updated_at = NOW()
            WHERE status = 'running'
                AND started_at < $1
            "#,
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await
        .context("Failed to reap stale running jobs")?;

        Ok(result.rows_affected())
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: &str,
        result: serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                result = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
