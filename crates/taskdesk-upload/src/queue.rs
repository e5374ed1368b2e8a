use taskdesk_core::UploadError;

use crate::record::{AttachmentId, AttachmentRecord, AttachmentStatus, NewAttachment};
use crate::validator::AttachmentValidator;

/// Per-status tally of a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub queued: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Ordered collection of staged files. Insertion order is upload order.
#[derive(Debug, Default)]
pub struct AttachmentQueue {
    records: Vec<AttachmentRecord>,
    validator: AttachmentValidator,
}

impl AttachmentQueue {
    pub fn new(validator: AttachmentValidator) -> Self {
        Self {
            records: Vec::new(),
            validator,
        }
    }

    /// Validate and append a file as `Queued`.
    ///
    /// Files that break the picker constraints are rejected with
    /// `InvalidAttachment` and the queue is left unchanged.
    pub fn add(&mut self, file: NewAttachment) -> Result<AttachmentId, UploadError> {
        self.validator
            .validate_all(&file.mime_type, file.size_bytes)
            .map_err(|e| {
                tracing::debug!(name = %file.name, error = %e, "Attachment rejected");
                UploadError::from(e)
            })?;

        let record = AttachmentRecord::new(file);
        let id = record.id();
        tracing::debug!(id = %id, name = %record.name(), size_bytes = record.size_bytes(), "Attachment queued");
        self.records.push(record);
        Ok(id)
    }

    /// Remove a record and release its payload. Refused while it is uploading.
    pub fn remove(&mut self, id: AttachmentId) -> Result<AttachmentRecord, UploadError> {
        let index = self
            .position(id)
            .ok_or_else(|| UploadError::InvalidState(format!("Unknown attachment {}", id)))?;

        if self.records[index].status() == AttachmentStatus::Uploading {
            return Err(UploadError::InvalidState(format!(
                "Attachment {} is uploading and cannot be removed",
                self.records[index].name()
            )));
        }

        let mut record = self.records.remove(index);
        record.release_payload();
        Ok(record)
    }

    /// Read-only view in upload order.
    pub fn list(&self) -> &[AttachmentRecord] {
        &self.records
    }

    pub fn get(&self, id: AttachmentId) -> Option<&AttachmentRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> QueueCounts {
        self.records
            .iter()
            .fold(QueueCounts::default(), |mut counts, record| {
                match record.status() {
                    AttachmentStatus::Queued => counts.queued += 1,
                    AttachmentStatus::Uploading => counts.uploading += 1,
                    AttachmentStatus::Uploaded => counts.uploaded += 1,
                    AttachmentStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    /// Whether every record has been uploaded.
    pub fn is_complete(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status() == AttachmentStatus::Uploaded)
    }

    fn position(&self, id: AttachmentId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub(crate) fn record_mut(&mut self, index: usize) -> Option<&mut AttachmentRecord> {
        self.records.get_mut(index)
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut AttachmentRecord> {
        self.records.iter_mut()
    }
}
