//! Attachment records and their lifecycle.
//!
//! A record moves `Queued -> Uploading -> {Uploaded | Failed}`. Only the
//! orchestrator drives those transitions; callers see records read-only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use taskdesk_core::{MetadataFailure, TransferFailure, UploadError};
use uuid::Uuid;

/// Local identifier assigned at selection time. Not the storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttachmentId(Uuid);

impl AttachmentId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Queued,
    Uploading,
    Uploaded,
    Failed,
}

impl AttachmentStatus {
    /// Whether a run should attempt this record.
    pub fn is_pending(self) -> bool {
        matches!(self, AttachmentStatus::Queued | AttachmentStatus::Failed)
    }
}

/// Raw file content owned by a record until it is uploaded or removed.
#[derive(Debug, Clone)]
pub enum AttachmentPayload {
    Memory(Bytes),
    /// Read lazily when the transfer starts.
    File(PathBuf),
}

impl AttachmentPayload {
    pub async fn load(&self) -> std::io::Result<Bytes> {
        match self {
            AttachmentPayload::Memory(bytes) => Ok(bytes.clone()),
            AttachmentPayload::File(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// A file selected for upload, before validation.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub payload: AttachmentPayload,
}

impl NewAttachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size_bytes: data.len() as u64,
            mime_type: mime_type.into(),
            payload: AttachmentPayload::Memory(data),
        }
    }

    /// Describe a local file. The MIME type is guessed from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidAttachment(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                UploadError::InvalidAttachment(format!("Invalid file name: {}", path.display()))
            })?;

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            mime_type,
            payload: AttachmentPayload::File(path.to_path_buf()),
        })
    }
}

/// Why a record ended `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentFailure {
    #[error(transparent)]
    Transfer(TransferFailure),

    #[error(transparent)]
    Metadata(MetadataFailure),

    #[error("Upload cancelled")]
    Cancelled,
}

impl AttachmentFailure {
    /// Short cause shown next to the file.
    pub fn cause(&self) -> &'static str {
        match self {
            AttachmentFailure::Transfer(failure) => failure.cause(),
            AttachmentFailure::Metadata(_) => "MetadataFailure",
            AttachmentFailure::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    id: AttachmentId,
    name: String,
    size_bytes: u64,
    mime_type: String,
    payload: Option<AttachmentPayload>,
    status: AttachmentStatus,
    remote_key: Option<String>,
    /// Written by the transfer's progress callback while the queue is borrowed by a run.
    progress_percent: Arc<AtomicU8>,
    failure: Option<AttachmentFailure>,
}

impl AttachmentRecord {
    pub(crate) fn new(file: NewAttachment) -> Self {
        Self {
            id: AttachmentId::new(),
            name: file.name,
            size_bytes: file.size_bytes,
            mime_type: file.mime_type,
            payload: Some(file.payload),
            status: AttachmentStatus::Queued,
            remote_key: None,
            progress_percent: Arc::new(AtomicU8::new(0)),
            failure: None,
        }
    }

    pub fn id(&self) -> AttachmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn status(&self) -> AttachmentStatus {
        self.status
    }

    /// Set only once the record is `Uploaded`.
    pub fn remote_key(&self) -> Option<&str> {
        self.remote_key.as_deref()
    }

    /// Live percent while `Uploading`, 100 once `Uploaded`.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent.load(Ordering::SeqCst)
    }

    pub fn failure(&self) -> Option<&AttachmentFailure> {
        self.failure.as_ref()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub(crate) fn payload(&self) -> Option<&AttachmentPayload> {
        self.payload.as_ref()
    }

    pub(crate) fn begin_upload(&mut self) {
        self.status = AttachmentStatus::Uploading;
        self.set_progress(0);
        self.failure = None;
    }

    pub(crate) fn progress_tracker(&self) -> Arc<AtomicU8> {
        self.progress_percent.clone()
    }

    fn set_progress(&self, percent: u8) {
        self.progress_percent.store(percent, Ordering::SeqCst);
    }

    pub(crate) fn mark_uploaded(&mut self, remote_key: String) {
        self.status = AttachmentStatus::Uploaded;
        self.remote_key = Some(remote_key);
        self.set_progress(100);
        self.payload = None;
    }

    pub(crate) fn mark_failed(&mut self, failure: AttachmentFailure) {
        self.status = AttachmentStatus::Failed;
        self.set_progress(0);
        self.failure = Some(failure);
    }

    /// Put a record stranded in `Uploading` by an abandoned run back in line.
    pub(crate) fn reset_interrupted(&mut self) -> bool {
        if self.status == AttachmentStatus::Uploading {
            self.status = AttachmentStatus::Queued;
            self.set_progress(0);
            true
        } else {
            false
        }
    }

    pub(crate) fn release_payload(&mut self) {
        self.payload = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AttachmentRecord {
        AttachmentRecord::new(NewAttachment::from_bytes(
            "a.png",
            "image/png",
            Bytes::from_static(b"\x89PNG"),
        ))
    }

    #[test]
    fn test_lifecycle_to_uploaded() {
        let mut record = record();
        assert_eq!(record.status(), AttachmentStatus::Queued);
        assert!(record.status().is_pending());

        record.begin_upload();
        record.progress_tracker().store(60, Ordering::SeqCst);
        assert_eq!(record.progress_percent(), 60);

        record.mark_uploaded("42/1-a.png".to_string());
        assert_eq!(record.status(), AttachmentStatus::Uploaded);
        assert_eq!(record.remote_key(), Some("42/1-a.png"));
        assert!(!record.has_payload());
        assert!(!record.status().is_pending());
    }

    #[test]
    fn test_failed_record_keeps_payload_for_retry() {
        let mut record = record();
        record.begin_upload();
        record.mark_failed(AttachmentFailure::Transfer(TransferFailure::NetworkError(
            "reset".into(),
        )));

        assert_eq!(record.status(), AttachmentStatus::Failed);
        assert_eq!(record.failure().map(|f| f.cause()), Some("NetworkError"));
        assert!(record.has_payload());
        assert!(record.remote_key().is_none());

        record.begin_upload();
        assert!(record.failure().is_none());
    }

    #[test]
    fn test_reset_interrupted_only_touches_uploading() {
        let mut record = record();
        assert!(!record.reset_interrupted());
        record.begin_upload();
        record.progress_tracker().store(30, Ordering::SeqCst);
        assert!(record.reset_interrupted());
        assert_eq!(record.status(), AttachmentStatus::Queued);
        assert_eq!(record.progress_percent(), 0);
    }

    #[tokio::test]
    async fn test_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let file = NewAttachment::from_path(&path).await.unwrap();
        assert_eq!(file.name, "report.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.size_bytes, 8);
        assert_eq!(file.payload.load().await.unwrap(), Bytes::from_static(b"%PDF-1.4"));
    }
}
