use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use fleetport_core::models::ImportPayload;
use fleetport_core::AppError;
use fleetport_services::ingest::TabularFormat;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidateEmail;

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportAccepted {
    pub job_id: Uuid,
    pub saved_file_path: String,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(format!("Upload exceeds the request size limit: {}", e));
    }
    AppError::InvalidInput(format!("Invalid multipart body: {}", e))
}

/// Upload a CSV or Excel file of vehicles for background import
///
/// The file is stored in the upload directory and an import job is queued.
/// The result is delivered to `email` once the job finishes.
#[utoipa::path(
    post,
    path = "/api/v1/vehicles/import",
    tag = "vehicles",
    request_body(content = inline(Object), content_type = "multipart/form-data", description = "Fields: `file` (.csv, .xlsx, .xls) and `email`"),
    responses(
        (status = 202, description = "Import job queued", body = ImportAccepted),
        (status = 400, description = "Missing field, invalid email or unsupported file type", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn import_vehicles(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImportAccepted>), HttpAppError> {
    let mut email: Option<String> = None;
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::InvalidInput("Uploaded file has no name".to_string()))?;
                let data = field.bytes().await.map_err(multipart_error)?;
                upload = Some((file_name, data));
            }
            Some("email") => {
                email = Some(field.text().await.map_err(multipart_error)?.trim().to_string());
            }
            _ => {}
        }
    }

    let email = email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Email is required".to_string()))?;
    if !email.validate_email() {
        return Err(AppError::InvalidInput(format!("Invalid email: {}", email)).into());
    }

    let (file_name, data) =
        upload.ok_or_else(|| AppError::InvalidInput("File is required".to_string()))?;

    // Reject before anything is written or queued.
    let max = state.config.max_upload_size_bytes;
    if data.len() > max {
        return Err(AppError::PayloadTooLarge(format!(
            "File is {} bytes, the limit is {} bytes",
            data.len(),
            max
        ))
        .into());
    }
    TabularFormat::from_path(Path::new(&file_name))
        .map_err(|e| AppError::UnsupportedFormat(e.to_string()))?;

    let saved_path = state.files.save_upload(&file_name, &data).await?;
    let saved_file_path = saved_path.display().to_string();

    let handle = state
        .queue
        .enqueue(&ImportPayload {
            file_path: saved_file_path.clone(),
            email,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %saved_file_path, "Failed to queue import job");
            AppError::Queue(e.to_string())
        })?;

    tracing::info!(
        job_id = %handle.id,
        path = %saved_file_path,
        size = data.len(),
        "Import job queued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ImportAccepted {
            job_id: handle.id,
            saved_file_path,
        }),
    ))
}
