use fleetport_core::JobError;
use fleetport_db::StoreError;
use fleetport_infra::NotifyError;
use fleetport_storage::StorageError;

use crate::ingest::ParseError;

/// Job-level failures of the import and export pipelines. Row-level problems
/// never surface here; they are counted in the outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Import failed for {path}: {reason}")]
    ImportFailed { path: String, reason: String },

    #[error(transparent)]
    Configuration(#[from] NotifyError),

    #[error("Vehicle store error: {0}")]
    Store(#[from] StoreError),

    #[error("File storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export failed: {0}")]
    Export(String),
}

impl From<ParseError> for PipelineError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedFormat(ext) => PipelineError::UnsupportedFormat(ext),
            ParseError::Open { path, reason } | ParseError::Read { path, reason } => {
                PipelineError::ImportFailed { path, reason }
            }
        }
    }
}

impl PipelineError {
    /// Unsupported formats and missing configuration fail the same way on
    /// every delivery.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PipelineError::UnsupportedFormat(_) | PipelineError::Configuration(_)
        )
    }

    pub fn into_job_error(self) -> JobError {
        if self.is_recoverable() {
            JobError::recoverable(self)
        } else {
            JobError::unrecoverable(self)
        }
    }
}
