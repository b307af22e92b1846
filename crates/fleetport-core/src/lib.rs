//! Fleetport Core Library
//!
//! Domain models, error types and configuration shared by every fleetport
//! component: the vehicle record, the job descriptors that travel through the
//! queue, and the outcomes the pipelines report.

pub mod config;
pub mod error;
pub mod job_error;
pub mod models;

pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use job_error::{is_unrecoverable, JobError};
