//! Configuration module
//!
//! Process configuration read from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const UPLOAD_DIR: &str = "uploads";
const EXPORT_DIR: &str = "export";
const NOTIFICATION_TIMEOUT_SECS: u64 = 10;
const JOB_MAX_WORKERS: usize = 4;
const JOB_POLL_INTERVAL_MS: u64 = 1000;
const JOB_MAX_ATTEMPTS: i32 = 3;
const JOB_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
const JOB_STALE_AFTER_SECS: u64 = 900;
const JOB_REAP_INTERVAL_SECS: u64 = 60;
const RETENTION_THRESHOLD_SECS: u64 = 300;
const RETENTION_INTERVAL_SECS: u64 = 600;
const MAX_UPLOAD_SIZE_MB: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Invalid LOG_FORMAT: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub log_format: LogFormat,
    /// When unset the in-memory store and job transport are used.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub upload_dir: PathBuf,
    pub export_dir: PathBuf,
    pub max_upload_size_bytes: usize,
    /// Notification endpoint. Absence is reported per notify call, not at startup.
    pub notification_service_url: Option<String>,
    pub notification_timeout_seconds: u64,
    pub job_max_workers: usize,
    pub job_poll_interval_ms: u64,
    pub job_max_attempts: i32,
    /// How long shutdown waits for running jobs before giving up on them.
    pub job_shutdown_timeout_seconds: u64,
    /// A job still `running` this long after it was claimed is assumed
    /// abandoned by a dead worker and is handed out again.
    pub job_stale_after_seconds: u64,
    pub job_reap_interval_seconds: u64,
    pub retention_enabled: bool,
    pub retention_threshold_seconds: u64,
    pub retention_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            upload_dir: PathBuf::from(UPLOAD_DIR),
            export_dir: PathBuf::from(EXPORT_DIR),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            notification_service_url: None,
            notification_timeout_seconds: NOTIFICATION_TIMEOUT_SECS,
            job_max_workers: JOB_MAX_WORKERS,
            job_poll_interval_ms: JOB_POLL_INTERVAL_MS,
            job_max_attempts: JOB_MAX_ATTEMPTS,
            job_shutdown_timeout_seconds: JOB_SHUTDOWN_TIMEOUT_SECS,
            job_stale_after_seconds: JOB_STALE_AFTER_SECS,
            job_reap_interval_seconds: JOB_REAP_INTERVAL_SECS,
            retention_enabled: true,
            retention_threshold_seconds: RETENTION_THRESHOLD_SECS,
            retention_interval_seconds: RETENTION_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid port number"))?,
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            log_format: env::var("LOG_FORMAT")
                .map(|s| s.parse())
                .unwrap_or(Ok(LogFormat::Pretty))?,
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_var("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            upload_dir: non_empty_var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(UPLOAD_DIR)),
            export_dir: non_empty_var("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(EXPORT_DIR)),
            max_upload_size_bytes: parse_var("MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
            notification_service_url: non_empty_var("NOTIFICATION_SERVICE_URL"),
            notification_timeout_seconds: parse_var(
                "NOTIFICATION_TIMEOUT_SECONDS",
                NOTIFICATION_TIMEOUT_SECS,
            ),
            job_max_workers: parse_var("JOB_MAX_WORKERS", JOB_MAX_WORKERS),
            job_poll_interval_ms: parse_var("JOB_POLL_INTERVAL_MS", JOB_POLL_INTERVAL_MS),
            job_max_attempts: parse_var("JOB_MAX_ATTEMPTS", JOB_MAX_ATTEMPTS),
            job_shutdown_timeout_seconds: parse_var(
                "JOB_SHUTDOWN_TIMEOUT_SECONDS",
                JOB_SHUTDOWN_TIMEOUT_SECS,
            ),
            job_stale_after_seconds: parse_var("JOB_STALE_AFTER_SECONDS", JOB_STALE_AFTER_SECS),
            job_reap_interval_seconds: parse_var(
                "JOB_REAP_INTERVAL_SECONDS",
                JOB_REAP_INTERVAL_SECS,
            ),
            retention_enabled: env::var("RETENTION_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            retention_threshold_seconds: parse_var(
                "RETENTION_THRESHOLD_SECONDS",
                RETENTION_THRESHOLD_SECS,
            ),
            retention_interval_seconds: parse_var(
                "RETENTION_INTERVAL_SECONDS",
                RETENTION_INTERVAL_SECS,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.job_max_workers == 0 {
            return Err(anyhow::anyhow!("JOB_MAX_WORKERS must be at least 1"));
        }

        if self.job_max_attempts < 1 {
            return Err(anyhow::anyhow!("JOB_MAX_ATTEMPTS must be at least 1"));
        }

        if self.job_stale_after_seconds == 0 || self.job_reap_interval_seconds == 0 {
            return Err(anyhow::anyhow!(
                "JOB_STALE_AFTER_SECONDS and JOB_REAP_INTERVAL_SECONDS must be greater than zero"
            ));
        }

        if self.retention_threshold_seconds == 0 {
            return Err(anyhow::anyhow!(
                "RETENTION_THRESHOLD_SECONDS must be greater than zero"
            ));
        }

        if self.retention_interval_seconds == 0 {
            return Err(anyhow::anyhow!(
                "RETENTION_INTERVAL_SECONDS must be greater than zero"
            ));
        }

        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.upload_dir == self.export_dir {
            return Err(anyhow::anyhow!(
                "UPLOAD_DIR and EXPORT_DIR must point to different directories"
            ));
        }

        if self.notification_service_url.is_none() {
            tracing::warn!(
                "NOTIFICATION_SERVICE_URL is not set; every job notification will fail with a configuration error"
            );
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr + ToString>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or(default)
}
