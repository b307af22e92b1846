//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::Result;
use fleetport_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    fleetport_infra::init_telemetry(config.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let pool = match &config.database_url {
        Some(url) => Some(database::setup_database(&config, url).await?),
        None => None,
    };

    let state = services::initialize_services(&config, pool).await?;

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
