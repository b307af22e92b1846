use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use fleetport_core::models::ExportPayload;
use fleetport_core::AppError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExportRequest {
    /// Minimum vehicle age in whole years (inclusive)
    pub min_age: u32,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportAccepted {
    pub job_id: Uuid,
    pub min_age: u32,
    pub email: String,
}

/// Queue an export of every vehicle at least `min_age` years old
#[utoipa::path(
    post,
    path = "/api/v1/vehicles/export",
    tag = "vehicles",
    request_body = ExportRequest,
    responses(
        (status = 202, description = "Export job queued", body = ExportAccepted),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 503, description = "Job transport unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(min_age = request.min_age))]
pub async fn export_vehicles(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ExportRequest>,
) -> Result<(StatusCode, Json<ExportAccepted>), HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let handle = state
        .queue
        .enqueue(&ExportPayload {
            min_age: request.min_age,
            email: request.email.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to queue export job");
            AppError::Queue(e.to_string())
        })?;

    tracing::info!(job_id = %handle.id, "Export job queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(ExportAccepted {
            job_id: handle.id,
            min_age: request.min_age,
            email: request.email,
        }),
    ))
}
