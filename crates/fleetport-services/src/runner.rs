//! Dispatches decoded jobs to the import and export pipelines.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use fleetport_core::models::Job;
use fleetport_worker::JobHandlerContext;

use crate::export::ExportPipeline;
use crate::ingest::ImportPipeline;

pub struct JobRunner {
    import: ImportPipeline,
    export: ExportPipeline,
}

impl JobRunner {
    pub fn new(import: ImportPipeline, export: ExportPipeline) -> Self {
        Self { import, export }
    }
}

#[async_trait]
impl JobHandlerContext for JobRunner {
    #[tracing::instrument(skip_all, fields(job.kind = %job.kind()))]
    async fn dispatch_job(self: Arc<Self>, job: Job) -> Result<serde_json::Value> {
        match job {
            Job::Import(payload) => {
                let outcome = self
                    .import
                    .run_import(Path::new(&payload.file_path), &payload.email)
                    .await
                    .map_err(|e| e.into_job_error())?;
                Ok(serde_json::to_value(outcome)?)
            }
            Job::Export(payload) => {
                let outcome = self
                    .export
                    .run_export(payload.min_age, &payload.email)
                    .await
                    .map_err(|e| e.into_job_error())?;
                Ok(serde_json::to_value(outcome)?)
            }
        }
    }
}
