use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::progress::{percent_of, ProgressCallback};
use crate::traits::{ObjectStoreClient, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;

/// Bytes written between progress reports and cancellation checks.
const WRITE_CHUNK_SIZE: usize = 1024 * 1024;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for attachment storage (e.g., "/var/lib/taskdesk/attachments")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/attachments")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty()
            || storage_key.contains("..")
            || storage_key.starts_with('/')
            || storage_key.contains('\\')
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Generate public URL for file
    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_chunks(
        &self,
        path: &Path,
        payload: &Bytes,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let total = payload.len() as u64;
        let mut written: u64 = 0;
        progress.on_progress(0);

        for chunk in payload.chunks(WRITE_CHUNK_SIZE) {
            if cancel.is_cancelled() {
                return Err(StorageError::Aborted);
            }
            file.write_all(chunk).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => StorageError::AccessDenied(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                )),
                _ => StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                )),
            })?;
            written += chunk.len() as u64;
            progress.on_progress(percent_of(written, total));
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        if total == 0 {
            progress.on_progress(100);
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStoreClient for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        _content_type: &str,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        let size = payload.len();

        self.ensure_parent_dir(&path).await.map_err(|e| match e {
            StorageError::IoError(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                StorageError::AccessDenied(io.to_string())
            }
            other => other,
        })?;

        let start = std::time::Instant::now();

        if let Err(e) = self.write_chunks(&path, &payload, progress, cancel).await {
            // Never leave a partial object behind.
            let _ = fs::remove_file(&path).await;
            tracing::warn!(
                error = %e,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage put_object did not complete"
            );
            return Err(e);
        }

        let url = self.generate_url(key);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url,
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn supports_abort(&self) -> bool {
        true
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
