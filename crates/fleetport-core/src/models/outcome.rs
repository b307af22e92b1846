use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Counts reported by one import run.
///
/// `skipped` is duplicates only. Rows that failed normalization land in
/// `rejected`; rows the store refused for any other reason land in `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImportOutcome {
    pub imported: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl ImportOutcome {
    pub fn total_rows(&self) -> u64 {
        self.imported + self.skipped + self.rejected + self.failed
    }

    pub fn unprocessable(&self) -> u64 {
        self.rejected + self.failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExportOutcome {
    pub exported: u64,
    /// Name of the generated file, `None` when nothing matched.
    pub file_name: Option<String>,
}
