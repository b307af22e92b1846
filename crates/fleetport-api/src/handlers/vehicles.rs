use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fleetport_core::models::{Page, Vehicle, VehicleUpdate};
use fleetport_services::vehicles::DEFAULT_PAGE_SIZE;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// 1-based page number (default 1)
    pub page: Option<u32>,
    /// Rows per page (default 10, max 100)
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Case-insensitive substring of the car model
    pub model: String,
}

/// List vehicles, one page at a time
#[utoipa::path(
    get,
    path = "/api/v1/vehicles",
    tag = "vehicles",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of vehicles", body = Page<Vehicle>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Vehicle>>, HttpAppError> {
    let page = state
        .vehicles
        .list(
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

/// Search vehicles by model
#[utoipa::path(
    get,
    path = "/api/v1/vehicles/search",
    tag = "vehicles",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching vehicles", body = Vec<Vehicle>),
        (status = 400, description = "Empty search keyword", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn search_vehicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Vehicle>>, HttpAppError> {
    let vehicles = state.vehicles.search_by_model(&query.model).await?;
    Ok(Json(vehicles))
}

/// Get a vehicle by VIN
#[utoipa::path(
    get,
    path = "/api/v1/vehicles/{vin}",
    tag = "vehicles",
    params(
        ("vin" = String, Path, description = "Vehicle identification number")
    ),
    responses(
        (status = 200, description = "Vehicle found", body = Vehicle),
        (status = 404, description = "Vehicle not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
) -> Result<Json<Vehicle>, HttpAppError> {
    let vehicle = state.vehicles.find_by_vin(&vin).await?;
    Ok(Json(vehicle))
}

/// Update some fields of a vehicle
///
/// `age_of_vehicle` is derived from `manufactured_date` and cannot be set directly.
#[utoipa::path(
    patch,
    path = "/api/v1/vehicles/{vin}",
    tag = "vehicles",
    params(
        ("vin" = String, Path, description = "Vehicle identification number")
    ),
    request_body = VehicleUpdate,
    responses(
        (status = 200, description = "Updated vehicle", body = Vehicle),
        (status = 400, description = "Empty or invalid update", body = ErrorResponse),
        (status = 404, description = "Vehicle not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, changes))]
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    Path(vin): Path<String>,
    ValidatedJson(changes): ValidatedJson<VehicleUpdate>,
) -> Result<Json<Vehicle>, HttpAppError> {
    let vehicle = state.vehicles.update(&vin, changes).await?;
    Ok(Json(vehicle))
}

/// Delete a vehicle by its numeric id
#[utoipa::path(
    delete,
    path = "/api/v1/vehicles/by-id/{id}",
    tag = "vehicles",
    params(
        ("id" = i64, Path, description = "Vehicle id")
    ),
    responses(
        (status = 200, description = "The deleted vehicle", body = Vehicle),
        (status = 404, description = "Vehicle not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vehicle>, HttpAppError> {
    let vehicle = state.vehicles.remove_by_id(id).await?;
    Ok(Json(vehicle))
}
