use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::Json,
};
use fleetport_core::models::JobEnvelope;
use fleetport_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Get a job's status, attempt count and result
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(
        ("id" = Uuid, Path, description = "Job ID returned by the import or export endpoint")
    ),
    responses(
        (status = 200, description = "Job found", body = JobEnvelope),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 503, description = "Job transport unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobEnvelope>, HttpAppError> {
    let job = state.queue.get_job(job_id).await.map_err(|e| {
        tracing::error!(error = %e, job_id = %job_id, "Failed to get job");
        AppError::Queue(e.to_string())
    })?;

    match job {
        Some(job) => Ok(Json(job)),
        None => Err(AppError::NotFound(format!("Job {} not found", job_id)).into()),
    }
}
