//! Fleetport services: the import and export pipelines, the retention
//! sweeper, vehicle lookups, and the job runner that ties them to the queue.

pub mod cleanup;
pub mod error;
pub mod export;
pub mod ingest;
pub mod runner;
pub mod vehicles;

#[cfg(test)]
mod testing;

pub use cleanup::{RetentionSweeper, SweepReport};
pub use error::PipelineError;
pub use export::{ExportPipeline, EXPORT_COLUMNS};
pub use ingest::{ImportPipeline, RawRow, RowRejection};
pub use runner::JobRunner;
pub use vehicles::VehicleService;
