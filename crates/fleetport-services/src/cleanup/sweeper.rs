use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};

/// Counts for one pass over one or more directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SweepReport {
    fn merge(&mut self, other: SweepReport) {
        self.scanned += other.scanned;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// Periodically deletes files older than a fixed threshold from the upload
/// and export directories.
///
/// The sweeper knows nothing about running jobs, so the threshold must be
/// longer than any import or export takes.
#[derive(Clone, Debug)]
pub struct RetentionSweeper {
    dirs: Vec<PathBuf>,
    threshold: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(dirs: Vec<PathBuf>, threshold: Duration, interval: Duration) -> Self {
        Self {
            dirs,
            threshold,
            interval,
        }
    }

    /// Start the background sweep loop. The first sweep runs immediately.
    /// Returns a JoinHandle; abort it to stop the sweeper.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(self.interval);
            sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                threshold_secs = self.threshold.as_secs(),
                "Retention sweeper started"
            );

            loop {
                sweep_interval.tick().await;
                self.sweep_once(SystemTime::now()).await;
            }
        })
    }

    /// Sweeps every directory once, judging file age against `now`.
    #[tracing::instrument(skip(self, now), fields(cleanup.operation = "retention_sweep"))]
    pub async fn sweep_once(&self, now: SystemTime) -> SweepReport {
        let mut total = SweepReport::default();

        for dir in &self.dirs {
            let report = match self.sweep_dir(dir, now).await {
                Ok(report) => report,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::warn!(dir = %dir.display(), "Directory does not exist, skipping cleanup");
                    SweepReport::default()
                }
                Err(e) => {
                    tracing::error!(dir = %dir.display(), error = %e, "Failed to scan directory");
                    SweepReport::default()
                }
            };
            total.merge(report);
        }

        tracing::info!(
            scanned = total.scanned,
            deleted = total.deleted,
            failed = total.failed,
            "Cleanup completed"
        );

        total
    }

    async fn sweep_dir(&self, dir: &Path, now: SystemTime) -> std::io::Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to stat file");
                    report.failed += 1;
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let modified = match metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "File has no modification time");
                    report.failed += 1;
                    continue;
                }
            };
            // Files stamped in the future count as brand new.
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.threshold {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), age_secs = age.as_secs(), "Deleted expired file");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to delete expired file");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
