use chrono::{NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;

use fleetport_core::models::ImportOutcome;
use fleetport_db::{StoreError, VehicleStore};
use fleetport_infra::{Notifier, NotifyError};

use super::normalizer::{normalize, RowRejection};
use super::parser::{parse_file, RawRow};
use crate::error::PipelineError;

/// What happened to a single row.
#[derive(Debug)]
pub enum RowOutcome {
    Imported,
    Duplicate,
    Rejected(RowRejection),
    Failed(StoreError),
}

/// Parses an uploaded file, persists every valid row whose VIN is new, and
/// tells the user how it went.
///
/// Rows are inserted one at a time and a duplicate VIN is detected by the
/// store's uniqueness check, so concurrent imports of overlapping files never
/// persist a VIN twice.
pub struct ImportPipeline {
    store: Arc<dyn VehicleStore>,
    notifier: Arc<dyn Notifier>,
    fixed_today: Option<NaiveDate>,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn VehicleStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            fixed_today: None,
        }
    }

    /// Pins the date used for age computation.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Utc::now().date_naive())
    }

    #[tracing::instrument(skip(self, path, email), fields(path = %path.display()))]
    pub async fn run_import(&self, path: &Path, email: &str) -> Result<ImportOutcome, PipelineError> {
        let file_name = display_name(path);

        let rows = match read_rows(path).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Import aborted before persisting any row");
                self.notify_failure(email, &file_name).await;
                return Err(e);
            }
        };

        let today = self.today();
        let mut outcome = ImportOutcome::default();

        for (index, row) in rows.iter().enumerate() {
            // Header is line 1.
            let line = index + 2;
            match self.import_row(row, today).await {
                RowOutcome::Imported => outcome.imported += 1,
                RowOutcome::Duplicate => outcome.skipped += 1,
                RowOutcome::Rejected(reason) => {
                    tracing::warn!(line, reason = %reason, "Row rejected");
                    outcome.rejected += 1;
                }
                RowOutcome::Failed(e) => {
                    tracing::error!(line, error = %e, "Failed to persist row");
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            imported = outcome.imported,
            skipped = outcome.skipped,
            rejected = outcome.rejected,
            failed = outcome.failed,
            "Import completed"
        );

        self.notifier
            .notify(email, &summary_message(&outcome), Some(&file_name))
            .await?;

        Ok(outcome)
    }

    async fn import_row(&self, row: &RawRow, today: NaiveDate) -> RowOutcome {
        let vehicle = match normalize(row, today) {
            Ok(vehicle) => vehicle,
            Err(reason) => return RowOutcome::Rejected(reason),
        };

        match self.store.insert(&vehicle).await {
            Ok(stored) => {
                tracing::debug!(vin = %stored.vin, id = stored.id, "Vehicle imported");
                RowOutcome::Imported
            }
            Err(e) if e.is_uniqueness_violation() => {
                tracing::debug!(vin = %vehicle.vin, "Duplicate VIN skipped");
                RowOutcome::Duplicate
            }
            Err(e) => RowOutcome::Failed(e),
        }
    }

    /// The original error always wins; a notifier problem here is only logged.
    async fn notify_failure(&self, email: &str, file_name: &str) {
        let message = format!("Import failed for file {}.", file_name);
        match self.notifier.notify(email, &message, None).await {
            Ok(_) => {}
            Err(NotifyError::Configuration(reason)) => {
                tracing::error!(reason = %reason, "Could not send import failure notification");
            }
        }
    }
}

async fn read_rows(path: &Path) -> Result<Vec<RawRow>, PipelineError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || parse_file(&owned))
        .await
        .map_err(|e| PipelineError::ImportFailed {
            path: path.display().to_string(),
            reason: format!("parser task failed: {}", e),
        })?
        .map_err(PipelineError::from)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The message sent to the user after a completed import.
pub fn summary_message(outcome: &ImportOutcome) -> String {
    let mut message = match (outcome.imported, outcome.skipped) {
        (0, 0) => "No vehicles to import. Your data is already up to date.".to_string(),
        (0, skipped) => format!(
            "No new vehicles were added because {} duplicates were skipped.",
            skipped
        ),
        (imported, 0) => format!("Import Successful! {} new vehicles added.", imported),
        (imported, skipped) => format!(
            "Import Successful! {} new vehicles added, {} duplicates skipped.",
            imported, skipped
        ),
    };

    let unprocessable = outcome.unprocessable();
    if unprocessable > 0 {
        message.push_str(&format!(" {} rows could not be imported.", unprocessable));
    }
    message
}
