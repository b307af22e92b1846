use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ImportVehicles,
    ExportVehicles,
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobKind::ImportVehicles => write!(f, "import_vehicles"),
            JobKind::ExportVehicles => write!(f, "export_vehicles"),
        }
    }
}

impl FromStr for JobKind {
    type Err = JobDispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import_vehicles" => Ok(JobKind::ImportVehicles),
            "export_vehicles" => Ok(JobKind::ExportVehicles),
            other => Err(JobDispatchError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never deliverable (unknown kind); not retried.
    Dropped,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Dropped => write!(f, "dropped"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "dropped" => Ok(JobStatus::Dropped),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Dropped
        )
    }
}

/// A job as the transport stores it. `kind` stays a raw string because a
/// shared transport may carry kinds this build does not know about.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub kind: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for JobEnvelope {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(JobEnvelope {
            id: row.try_get("id")?,
            kind: row.try_get("kind")?,
            status: row.try_get::<String, _>("status")?.parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse job status: {}", e).into())
            })?,
            payload: row.try_get("payload")?,
            result: row.try_get("result")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            scheduled_at: row.try_get("scheduled_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl JobEnvelope {
    /// `attempts` counts deliveries so far, including the current one.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn decode(&self) -> Result<Job, JobDispatchError> {
        Job::decode(&self.kind, &self.payload)
    }
}

/// Returned to producers once a job is accepted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobHandle {
    pub id: Uuid,
    pub kind: JobKind,
}

/// Type-safe job payloads.
pub trait JobPayload: Serialize + for<'de> Deserialize<'de> {
    fn kind() -> JobKind;

    fn notify_email(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ImportPayload {
    pub file_path: String,
    pub email: String,
}

impl JobPayload for ImportPayload {
    fn kind() -> JobKind {
        JobKind::ImportVehicles
    }

    fn notify_email(&self) -> &str {
        &self.email
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExportPayload {
    pub min_age: u32,
    pub email: String,
}

impl JobPayload for ExportPayload {
    fn kind() -> JobKind {
        JobKind::ExportVehicles
    }

    fn notify_email(&self) -> &str {
        &self.email
    }
}

/// A decoded job, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Import(ImportPayload),
    Export(ExportPayload),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Import(_) => JobKind::ImportVehicles,
            Job::Export(_) => JobKind::ExportVehicles,
        }
    }

    /// Decode a raw transport entry. Unknown kinds, undecodable payloads and
    /// payloads without a notification email are all rejected.
    pub fn decode(kind: &str, payload: &serde_json::Value) -> Result<Job, JobDispatchError> {
        let job = match kind.parse::<JobKind>()? {
            JobKind::ImportVehicles => Job::Import(decode_payload(kind, payload)?),
            JobKind::ExportVehicles => Job::Export(decode_payload(kind, payload)?),
        };
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> Result<(), JobDispatchError> {
        let email = match self {
            Job::Import(p) => p.notify_email(),
            Job::Export(p) => p.notify_email(),
        };
        if email.trim().is_empty() {
            return Err(JobDispatchError::MissingEmail(self.kind().to_string()));
        }
        Ok(())
    }
}

fn decode_payload<P: JobPayload>(
    kind: &str,
    payload: &serde_json::Value,
) -> Result<P, JobDispatchError> {
    serde_json::from_value(payload.clone()).map_err(|source| JobDispatchError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum JobDispatchError {
    #[error("Unknown job kind: {0}")]
    UnknownKind(String),

    #[error("Invalid payload for job kind {kind}: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job of kind {0} has no notification email")]
    MissingEmail(String),
}

impl JobDispatchError {
    /// Unknown kinds may belong to another consumer of a shared transport;
    /// they are dropped rather than failed.
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, JobDispatchError::UnknownKind(_))
    }
}
