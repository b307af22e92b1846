//! OpenAPI documentation, served at `/api/openapi.json`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use fleetport_core::models;

pub fn openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fleetport API",
        version = "0.1.0",
        description = "Bulk vehicle import from CSV/Excel, filtered CSV export, and vehicle lookups. Imports and exports run as background jobs; results are delivered to the given email through the notification service."
    ),
    paths(
        handlers::vehicle_import::import_vehicles,
        handlers::vehicle_export::export_vehicles,
        handlers::export_download::download_export,
        handlers::vehicles::list_vehicles,
        handlers::vehicles::search_vehicles,
        handlers::vehicles::get_vehicle,
        handlers::vehicles::update_vehicle,
        handlers::vehicles::delete_vehicle,
        handlers::jobs::get_job,
    ),
    components(
        schemas(
            models::Vehicle,
            models::VehicleUpdate,
            models::JobEnvelope,
            models::JobStatus,
            models::ImportOutcome,
            models::ExportOutcome,
            handlers::vehicle_import::ImportAccepted,
            handlers::vehicle_export::ExportRequest,
            handlers::vehicle_export::ExportAccepted,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "vehicles", description = "Vehicle import, export and lookups"),
        (name = "jobs", description = "Background job status"),
    )
)]
pub struct ApiDoc;
