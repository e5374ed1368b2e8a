//! Object storage capability trait
//!
//! This module defines the `ObjectStoreClient` trait that all storage backends
//! implement, and how backend errors map onto the transfer failure taxonomy.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use taskdesk_core::{StorageBackend, TransferFailure};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressCallback;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transfer aborted")]
    Aborted,

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for TransferFailure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AccessDenied(detail) => TransferFailure::AccessDenied(detail),
            StorageError::Network(detail) => TransferFailure::NetworkError(detail),
            StorageError::Timeout(limit) => {
                TransferFailure::NetworkError(format!("transfer timed out after {:?}", limit))
            }
            StorageError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                TransferFailure::AccessDenied(e.to_string())
            }
            StorageError::IoError(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::BrokenPipe
                ) =>
            {
                TransferFailure::NetworkError(e.to_string())
            }
            other => TransferFailure::Unknown(other.to_string()),
        }
    }
}

/// A stored object: the key assigned by the store and a URL to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Object storage capability (`putObject(key, bytes, onProgress)`).
///
/// All storage backends (S3, local filesystem) implement this trait, so the
/// upload orchestrator works with any of them and with test doubles.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Store `payload` under `key`.
    ///
    /// `progress` receives percentages while the transfer runs. Backends that
    /// report [`supports_abort`](Self::supports_abort) watch `cancel` between
    /// chunks, clean up the partial object and return [`StorageError::Aborted`].
    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<StoredObject>;

    /// Delete an object by key. Deleting a missing object succeeds.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    /// Whether `put_object` honors its cancellation token itself.
    ///
    /// When false, callers stop waiting on cancellation by dropping the transfer.
    fn supports_abort(&self) -> bool {
        false
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
