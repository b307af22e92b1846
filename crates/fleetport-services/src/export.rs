//! Export pipeline
//!
//! Writes every vehicle at least `min_age` years old to a fresh CSV file in
//! the export directory and tells the user its name. Old files are left to
//! the retention sweeper.

use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;

use fleetport_core::models::{age_cutoff, calendar_age, ExportOutcome, Vehicle};
use fleetport_db::VehicleStore;
use fleetport_infra::Notifier;
use fleetport_storage::TransferStore;

use crate::error::PipelineError;

pub const EXPORT_FILE_PREFIX: &str = "export_vehicles";

pub const EXPORT_COLUMNS: [&str; 9] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "car_make",
    "car_model",
    "vin",
    "manufactured_date",
    "age_of_vehicle",
];

pub struct ExportPipeline {
    store: Arc<dyn VehicleStore>,
    files: Arc<TransferStore>,
    notifier: Arc<dyn Notifier>,
    fixed_today: Option<NaiveDate>,
}

impl ExportPipeline {
    pub fn new(
        store: Arc<dyn VehicleStore>,
        files: Arc<TransferStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            files,
            notifier,
            fixed_today: None,
        }
    }

    /// Pins the date ages are measured against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Utc::now().date_naive())
    }

    #[tracing::instrument(skip(self, email))]
    pub async fn run_export(&self, min_age: u32, email: &str) -> Result<ExportOutcome, PipelineError> {
        let today = self.today();
        let mut vehicles = match age_cutoff(today, min_age) {
            Some(cutoff) => self
                .store
                .find_manufactured_on_or_before(cutoff)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to query vehicles for export");
                    e
                })?,
            None => Vec::new(),
        };
        // Stored ages are as of the import date.
        for v in &mut vehicles {
            v.age_of_vehicle = calendar_age(v.manufactured_date, today);
        }

        if vehicles.is_empty() {
            tracing::info!("No vehicles matched export criteria");
            let message = format!("No vehicles found older than {} years.", min_age);
            self.notifier.notify(email, &message, None).await?;
            return Ok(ExportOutcome {
                exported: 0,
                file_name: None,
            });
        }

        let reserved = self
            .files
            .reserve_export_file(EXPORT_FILE_PREFIX, "csv")
            .await?;

        let exported = match write_export(reserved.path.clone(), vehicles).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(file_name = %reserved.file_name, error = %e, "Failed to write export file");
                if let Err(remove_err) = tokio::fs::remove_file(&reserved.path).await {
                    tracing::warn!(error = %remove_err, "Failed to remove partial export file");
                }
                return Err(e);
            }
        };

        tracing::info!(file_name = %reserved.file_name, exported, "Export file written");

        let message = format!("Export complete! {} vehicles exported.", exported);
        self.notifier
            .notify(email, &message, Some(&reserved.file_name))
            .await?;

        Ok(ExportOutcome {
            exported,
            file_name: Some(reserved.file_name),
        })
    }
}

/// One bulk write of all matched rows.
async fn write_export(path: PathBuf, vehicles: Vec<Vehicle>) -> Result<u64, PipelineError> {
    tokio::task::spawn_blocking(move || write_csv(&path, &vehicles))
        .await
        .map_err(|e| PipelineError::Export(format!("writer task failed: {}", e)))?
}

fn write_csv(path: &std::path::Path, vehicles: &[Vehicle]) -> Result<u64, PipelineError> {
    let export_error = |e: csv::Error| PipelineError::Export(e.to_string());

    let mut writer = csv::Writer::from_path(path).map_err(export_error)?;
    writer.write_record(EXPORT_COLUMNS).map_err(export_error)?;

    for v in vehicles {
        writer
            .write_record([
                v.id.to_string(),
                v.first_name.clone(),
                v.last_name.clone(),
                v.email.clone(),
                v.car_make.clone(),
                v.car_model.clone(),
                v.vin.clone(),
                v.manufactured_date.format("%Y-%m-%d").to_string(),
                v.age_of_vehicle.to_string(),
            ])
            .map_err(export_error)?;
    }

    writer
        .flush()
        .map_err(|e| PipelineError::Export(e.to_string()))?;
    Ok(vehicles.len() as u64)
}
