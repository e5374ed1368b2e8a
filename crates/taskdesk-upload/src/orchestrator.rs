//! Sequential upload orchestrator.
//!
//! Drives every pending record of an [`AttachmentQueue`] through the object
//! store and the metadata API, one record at a time, in queue order. Record
//! N+1 never starts before record N's transfer and metadata save have both
//! settled. Per-file failures are stored on the record and tallied; they never
//! abort the run.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskdesk_core::{
    AttachmentMeta, MetadataApi, ParentId, TransferFailure, UploadConfig, UploadError,
};
use taskdesk_storage::{
    CancellationToken, ObjectStoreClient, ProgressCallback, RemoteKeyGenerator, StorageError,
    StoredObject,
};
use tokio::sync::broadcast;

use crate::control::UploadHandle;
use crate::events::{EventSink, UploadEvent};
use crate::queue::AttachmentQueue;
use crate::record::{AttachmentFailure, AttachmentId};
use crate::result::{RunResult, RunStop};

const NO_CURRENT: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Pause inserted after each successful record before the next one starts.
    pub pacing_delay: Duration,
    /// Upper bound for a single transfer. `None` waits indefinitely.
    pub transfer_timeout: Option<Duration>,
    pub event_capacity: usize,
}

impl OrchestratorOptions {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            pacing_delay: config.pacing_delay(),
            transfer_timeout: config.transfer_timeout(),
            event_capacity: config.event_channel_capacity,
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

/// Progress of the current run, readable while it is in flight.
#[derive(Debug)]
struct RunProgress {
    total: AtomicUsize,
    settled: AtomicUsize,
    current_index: AtomicUsize,
    current_percent: AtomicU8,
    aggregate: AtomicU8,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            total: AtomicUsize::new(0),
            settled: AtomicUsize::new(0),
            current_index: AtomicUsize::new(NO_CURRENT),
            current_percent: AtomicU8::new(0),
            aggregate: AtomicU8::new(0),
        }
    }
}

impl RunProgress {
    fn start(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.settled.store(0, Ordering::SeqCst);
        self.current_index.store(NO_CURRENT, Ordering::SeqCst);
        self.current_percent.store(0, Ordering::SeqCst);
        self.aggregate
            .store(if total == 0 { 100 } else { 0 }, Ordering::SeqCst);
    }

    fn begin_record(&self, index: usize) {
        self.current_percent.store(0, Ordering::SeqCst);
        self.current_index.store(index, Ordering::SeqCst);
    }

    /// Returns the new aggregate when the record advanced.
    fn advance(&self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        let previous = self.current_percent.fetch_max(percent, Ordering::SeqCst);
        (percent > previous).then(|| self.recompute())
    }

    fn settle_record(&self) -> u8 {
        self.settled.fetch_add(1, Ordering::SeqCst);
        self.current_percent.store(0, Ordering::SeqCst);
        self.current_index.store(NO_CURRENT, Ordering::SeqCst);
        self.recompute()
    }

    fn finish(&self) {
        self.current_index.store(NO_CURRENT, Ordering::SeqCst);
    }

    /// `(settled * 100 + current%) / total`, never decreasing within a run.
    fn recompute(&self) -> u8 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 100;
        }
        let settled = self.settled.load(Ordering::SeqCst);
        let current = self.current_percent.load(Ordering::SeqCst) as usize;
        let value = ((settled * 100 + current) / total).min(100) as u8;
        let previous = self.aggregate.fetch_max(value, Ordering::SeqCst);
        previous.max(value)
    }
}

/// Progress callback handed to the object store for one record.
struct RecordProgress<'a> {
    id: AttachmentId,
    percent: Arc<AtomicU8>,
    run: &'a RunProgress,
    events: &'a EventSink,
}

impl ProgressCallback for RecordProgress<'_> {
    fn on_progress(&self, percent: u8) {
        self.percent.fetch_max(percent.min(100), Ordering::SeqCst);
        if let Some(aggregate_percent) = self.run.advance(percent) {
            tracing::debug!(id = %self.id, percent, aggregate_percent, "Upload progress");
            self.events.send(UploadEvent::Progress {
                id: self.id,
                percent: percent.min(100),
                aggregate_percent,
            });
        }
    }
}

enum RecordOutcome {
    Uploaded,
    Failed,
    Cancelled,
}

/// Uploads queued attachments to an object store, one at a time.
pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStoreClient>,
    metadata: Arc<dyn MetadataApi>,
    keys: RemoteKeyGenerator,
    options: OrchestratorOptions,
    handle: UploadHandle,
    events: EventSink,
    progress: RunProgress,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStoreClient>,
        metadata: Arc<dyn MetadataApi>,
        options: OrchestratorOptions,
    ) -> Self {
        let events = EventSink::new(options.event_capacity);
        Self {
            store,
            metadata,
            keys: RemoteKeyGenerator::new(),
            options,
            handle: UploadHandle::new(),
            events,
            progress: RunProgress::default(),
        }
    }

    /// Cloneable pause/cancel switch usable while `run` holds the queue.
    pub fn handle(&self) -> UploadHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Takes effect before the next record starts. Idempotent.
    pub fn pause(&self) {
        self.handle.pause();
    }

    /// Aborts the transfer in flight and stops the run. Idempotent.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.handle.is_paused()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Queue index of the record currently uploading.
    pub fn current_index(&self) -> Option<usize> {
        match self.progress.current_index.load(Ordering::SeqCst) {
            NO_CURRENT => None,
            index => Some(index),
        }
    }

    /// Aggregate progress over the records scheduled for the current run.
    pub fn aggregate_progress(&self) -> u8 {
        self.progress.aggregate.load(Ordering::SeqCst)
    }

    /// Clear the pause and cancel flags and run again for the same parent.
    ///
    /// Uploaded records are skipped; queued and failed ones are attempted.
    pub async fn resume(
        &self,
        queue: &mut AttachmentQueue,
        parent: Option<&ParentId>,
    ) -> Result<RunResult, UploadError> {
        let parent = parent.ok_or_else(|| {
            UploadError::InvalidState(
                "Cannot resume uploads before the parent resource exists".to_string(),
            )
        })?;

        self.handle.reset();
        Ok(self.run(queue, parent).await)
    }

    /// Upload every `Queued` or `Failed` record of `queue` under `parent`.
    pub async fn run(&self, queue: &mut AttachmentQueue, parent: &ParentId) -> RunResult {
        for record in queue.records_mut() {
            if record.reset_interrupted() {
                tracing::debug!(id = %record.id(), name = %record.name(), "Requeued interrupted upload");
            }
        }

        let scheduled: Vec<usize> = queue
            .list()
            .iter()
            .enumerate()
            .filter(|(_, record)| record.status().is_pending())
            .map(|(index, _)| index)
            .collect();

        self.progress.start(scheduled.len());

        if scheduled.is_empty() {
            tracing::debug!(parent_id = %parent, "Nothing to upload");
            let result = RunResult::empty();
            self.events.send(UploadEvent::RunFinished(result.clone()));
            return result;
        }

        let start = Instant::now();
        let token = self.handle.token();
        tracing::info!(parent_id = %parent, total = scheduled.len(), "Upload run started");
        self.events.send(UploadEvent::RunStarted {
            parent_id: parent.clone(),
            total: scheduled.len(),
        });

        let mut uploaded = 0;
        let mut failed = 0;
        let mut stop = None;
        let mut previous_uploaded = false;

        for (position, &index) in scheduled.iter().enumerate() {
            if previous_uploaded && !self.options.pacing_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.pacing_delay) => {}
                    _ = token.cancelled() => {}
                }
            }

            if self.handle.is_cancelled() {
                stop = Some(RunStop::Cancelled);
                break;
            }
            if self.handle.is_paused() {
                let remaining = scheduled.len() - position;
                tracing::info!(parent_id = %parent, remaining, "Upload run paused");
                self.events.send(UploadEvent::RunPaused { remaining });
                stop = Some(RunStop::Paused);
                break;
            }

            match self
                .process_record(queue, index, position, parent, &token)
                .await
            {
                RecordOutcome::Uploaded => {
                    uploaded += 1;
                    previous_uploaded = true;
                }
                RecordOutcome::Failed => {
                    failed += 1;
                    previous_uploaded = false;
                }
                RecordOutcome::Cancelled => {
                    failed += 1;
                    stop = Some(RunStop::Cancelled);
                    break;
                }
            }
        }

        self.progress.finish();

        if stop.is_none() {
            if self.handle.is_cancelled() {
                stop = Some(RunStop::Cancelled);
            } else if self.handle.is_paused() {
                stop = Some(RunStop::Paused);
            }
        }
        if stop == Some(RunStop::Cancelled) {
            tracing::info!(parent_id = %parent, "Upload run cancelled");
            self.events.send(UploadEvent::RunCancelled);
        }

        let result = RunResult::new(uploaded, failed, stop);
        tracing::info!(
            parent_id = %parent,
            uploaded = result.uploaded,
            failed = result.failed,
            success = result.success,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload run finished"
        );
        self.events.send(UploadEvent::RunFinished(result.clone()));
        result
    }

    async fn process_record(
        &self,
        queue: &mut AttachmentQueue,
        index: usize,
        position: usize,
        parent: &ParentId,
        token: &CancellationToken,
    ) -> RecordOutcome {
        let Some(record) = queue.record_mut(index) else {
            return RecordOutcome::Failed;
        };

        record.begin_upload();
        self.progress.begin_record(index);

        let id = record.id();
        let name = record.name().to_string();
        let size_bytes = record.size_bytes();
        let mime_type = record.mime_type().to_string();
        let payload = record.payload().cloned();
        let live_percent = record.progress_tracker();

        self.events.send(UploadEvent::RecordStarted {
            id,
            name: name.clone(),
            index: position,
        });

        let key = self.keys.derive(parent, &name);
        let start = Instant::now();

        let bytes = match payload {
            Some(payload) => payload.load().await.map_err(StorageError::from),
            None => Err(StorageError::UploadFailed(
                "attachment payload already released".to_string(),
            )),
        };

        let transferred = match bytes {
            Ok(bytes) => {
                let progress = RecordProgress {
                    id,
                    percent: live_percent,
                    run: &self.progress,
                    events: &self.events,
                };
                self.transfer(&key, bytes, &mime_type, &progress, token)
                    .await
            }
            Err(e) => Err(e),
        };

        let stored = match transferred {
            Ok(stored) => stored,
            Err(StorageError::Aborted) => {
                tracing::warn!(id = %id, name = %name, key = %key, "Upload aborted by cancel");
                return self.settle_failed(queue, index, AttachmentFailure::Cancelled);
            }
            Err(e) => {
                let failure = TransferFailure::from(e);
                tracing::warn!(
                    id = %id,
                    name = %name,
                    key = %key,
                    size_bytes,
                    cause = failure.cause(),
                    error = %failure,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Attachment transfer failed"
                );
                return self.settle_failed(queue, index, AttachmentFailure::Transfer(failure));
            }
        };

        let meta = AttachmentMeta {
            parent_resource_id: parent.clone(),
            key: stored.key.clone(),
            name: name.clone(),
            size_bytes,
            mime_type,
        };

        if let Err(failure) = self.metadata.save(&meta).await {
            tracing::warn!(
                id = %id,
                name = %name,
                key = %stored.key,
                status = ?failure.status,
                error = %failure,
                "Attachment metadata save failed"
            );
            self.remove_orphan(&stored.key).await;
            return self.settle_failed(queue, index, AttachmentFailure::Metadata(failure));
        }

        if let Some(record) = queue.record_mut(index) {
            record.mark_uploaded(stored.key.clone());
        }
        let aggregate_percent = self.progress.settle_record();

        tracing::info!(
            id = %id,
            name = %name,
            key = %stored.key,
            parent_id = %parent,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Attachment uploaded"
        );
        self.events.send(UploadEvent::Progress {
            id,
            percent: 100,
            aggregate_percent,
        });
        self.events.send(UploadEvent::RecordUploaded {
            id,
            remote_key: stored.key,
        });

        RecordOutcome::Uploaded
    }

    /// Run one transfer under the configured timeout.
    ///
    /// A transfer that times out, or is cancelled on a store without abort
    /// support, must not leave a partial object behind. Abortable stores get
    /// their attempt token cancelled and are awaited until they have cleaned
    /// up; other stores get a best-effort delete of the key.
    async fn transfer(
        &self,
        key: &str,
        bytes: bytes::Bytes,
        mime_type: &str,
        progress: &RecordProgress<'_>,
        token: &CancellationToken,
    ) -> Result<StoredObject, StorageError> {
        let attempt = token.child_token();
        let abortable = self.store.supports_abort();
        let put = self
            .store
            .put_object(key, bytes, mime_type, progress, &attempt);
        tokio::pin!(put);

        let deadline = async {
            match self.options.transfer_timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let interrupted = tokio::select! {
            biased;
            _ = token.cancelled(), if !abortable => StorageError::Aborted,
            result = &mut put => return result,
            limit = deadline => StorageError::Timeout(limit),
        };

        attempt.cancel();
        if abortable {
            if let Ok(stored) = put.await {
                self.remove_orphan(&stored.key).await;
            }
        } else {
            self.remove_orphan(key).await;
        }

        Err(interrupted)
    }

    fn settle_failed(
        &self,
        queue: &mut AttachmentQueue,
        index: usize,
        failure: AttachmentFailure,
    ) -> RecordOutcome {
        let outcome = match failure {
            AttachmentFailure::Cancelled => RecordOutcome::Cancelled,
            _ => RecordOutcome::Failed,
        };

        if let Some(record) = queue.record_mut(index) {
            self.events.send(UploadEvent::RecordFailed {
                id: record.id(),
                failure: failure.clone(),
            });
            record.mark_failed(failure);
        }
        self.progress.settle_record();

        outcome
    }

    /// Best-effort delete of an object whose metadata could not be saved.
    async fn remove_orphan(&self, key: &str) {
        if let Err(e) = self.store.delete_object(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete orphaned attachment object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_is_monotonic() {
        let run = RunProgress::default();
        run.start(2);
        run.begin_record(0);
        assert_eq!(run.advance(50), Some(25));
        assert_eq!(run.advance(40), None);
        assert_eq!(run.settle_record(), 50);
        run.begin_record(1);
        assert_eq!(run.advance(10), Some(55));
        assert_eq!(run.settle_record(), 100);
    }

    #[test]
    fn test_empty_run_is_complete() {
        let run = RunProgress::default();
        run.start(0);
        assert_eq!(run.aggregate.load(Ordering::SeqCst), 100);
        assert_eq!(run.recompute(), 100);
    }
}
