use crate::traits::{ByteStream, StorageError, StorageResult};
use chrono::Utc;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Collisions beyond this many suffixes are treated as an error.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A newly created, empty file in the export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedFile {
    pub file_name: String,
    pub path: PathBuf,
}

/// Upload and export directories on local disk.
#[derive(Clone, Debug)]
pub struct TransferStore {
    upload_dir: PathBuf,
    export_dir: PathBuf,
}

impl TransferStore {
    /// Creates both directories if they are missing.
    pub async fn new(
        upload_dir: impl Into<PathBuf>,
        export_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let upload_dir = upload_dir.into();
        let export_dir = export_dir.into();

        for dir in [&upload_dir, &export_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(TransferStore {
            upload_dir,
            export_dir,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Writes an uploaded file as `{unix_millis}-{sanitized name}` and returns
    /// its path. Never overwrites an existing upload.
    #[tracing::instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save_upload(&self, original_name: &str, data: &[u8]) -> StorageResult<PathBuf> {
        let stem = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(original_name)
        );
        let (stem, extension) = split_extension(&stem);

        let (file_name, path, mut file) =
            create_unique(&self.upload_dir, &stem, extension.as_deref())
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(file_name = %file_name, path = %path.display(), "Upload stored");

        Ok(path)
    }

    /// Creates an empty export file named `{prefix}_{unix_millis}.{extension}`,
    /// appending `_{n}` when that name is taken.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_export_file(
        &self,
        prefix: &str,
        extension: &str,
    ) -> StorageResult<ReservedFile> {
        let stem = format!("{}_{}", prefix, Utc::now().timestamp_millis());
        let (file_name, path, _file) =
            create_unique(&self.export_dir, &stem, Some(extension)).await?;

        tracing::debug!(file_name = %file_name, "Export file reserved");

        Ok(ReservedFile { file_name, path })
    }

    /// Streams an export file by name.
    #[tracing::instrument(skip(self))]
    pub async fn open_export(&self, file_name: &str) -> StorageResult<ByteStream> {
        let path = self.export_path(file_name)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(file_name.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let reader = tokio_util::io::ReaderStream::new(file);
        let path_display = path.display().to_string();
        let stream = reader.map(move |result| {
            result.map_err(|e| {
                tracing::error!(path = %path_display, error = %e, "Export stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    /// Resolves a bare file name inside the export directory.
    ///
    /// Names containing path separators or `..` are rejected so a caller
    /// cannot reach outside the directory.
    pub fn export_path(&self, file_name: &str) -> StorageResult<PathBuf> {
        if file_name.is_empty()
            || file_name.contains("..")
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains('\0')
        {
            return Err(StorageError::InvalidKey(format!(
                "'{}' is not a plain file name",
                file_name
            )));
        }

        Ok(self.export_dir.join(file_name))
    }
}

/// Opens `{stem}.{ext}` with create-new semantics, falling back to
/// `{stem}_{n}.{ext}` until a free name is found.
async fn create_unique(
    dir: &Path,
    stem: &str,
    extension: Option<&str>,
) -> StorageResult<(String, PathBuf, fs::File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let base = if attempt == 0 {
            stem.to_string()
        } else {
            format!("{}_{}", stem, attempt)
        };
        let file_name = match extension {
            Some(ext) => format!("{}.{}", base, ext),
            None => base,
        };
        let path = dir.join(&file_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file_name, path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::IoError(e)),
        }
    }

    Err(StorageError::UploadFailed(format!(
        "No free file name for {} in {}",
        stem,
        dir.display()
    )))
}

fn split_extension(name: &str) -> (String, Option<String>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), Some(ext.to_string()))
        }
        _ => (name.to_string(), None),
    }
}

/// Reduces a client-supplied name to `[A-Za-z0-9._-]`, dropping any
/// directory components and leading dots.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
