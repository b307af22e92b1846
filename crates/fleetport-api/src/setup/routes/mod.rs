//! Route configuration and setup.

mod health;

use crate::constants::{API_PREFIX, HTTP_CONCURRENCY_LIMIT, MULTIPART_OVERHEAD_BYTES};
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{delete, get, post},
    Json, Router,
};
use fleetport_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    public_routes(state.clone())
        .merge(vehicle_routes(state.clone()))
        .merge(job_routes(state.clone()))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(
            config.max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::openapi_spec()) }),
        )
        .with_state(state)
}

fn vehicle_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/vehicles", API_PREFIX),
            get(handlers::vehicles::list_vehicles),
        )
        .route(
            &format!("{}/vehicles/search", API_PREFIX),
            get(handlers::vehicles::search_vehicles),
        )
        .route(
            &format!("{}/vehicles/import", API_PREFIX),
            post(handlers::vehicle_import::import_vehicles),
        )
        .route(
            &format!("{}/vehicles/export", API_PREFIX),
            post(handlers::vehicle_export::export_vehicles),
        )
        .route(
            &format!("{}/vehicles/export/download", API_PREFIX),
            get(handlers::export_download::download_export),
        )
        .route(
            &format!("{}/vehicles/by-id/{{id}}", API_PREFIX),
            delete(handlers::vehicles::delete_vehicle),
        )
        .route(
            &format!("{}/vehicles/{{vin}}", API_PREFIX),
            get(handlers::vehicles::get_vehicle).patch(handlers::vehicles::update_vehicle),
        )
        .with_state(state)
}

fn job_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/jobs/{{id}}", API_PREFIX),
            get(handlers::jobs::get_job),
        )
        .with_state(state)
}
