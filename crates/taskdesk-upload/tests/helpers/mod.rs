//! Test helpers: in-memory doubles for the object store, the metadata API and
//! the resource API, plus queue fixtures.
//!
//! Run from workspace root: `cargo test -p taskdesk-upload`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use taskdesk_core::{
    AttachmentMeta, MetadataApi, MetadataFailure, ResourceApi, SavedAttachment, StorageBackend,
    UploadError,
};
use taskdesk_storage::{
    CancellationToken, ObjectStoreClient, ProgressCallback, StorageError, StorageResult,
    StoredObject,
};
use taskdesk_upload::{
    AttachmentQueue, NewAttachment, OrchestratorOptions, UploadHandle, UploadOrchestrator,
};

pub const MIB: usize = 1024 * 1024;

/// How a scripted transfer misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    AccessDenied,
    Network,
    Unknown,
    /// Never settles until the caller gives up.
    Hang,
    /// Reports half the payload, then hangs.
    Stall,
}

impl ScriptedFailure {
    fn into_error(self) -> StorageError {
        match self {
            ScriptedFailure::AccessDenied => StorageError::AccessDenied("403 Forbidden".into()),
            ScriptedFailure::Network => StorageError::Network("connection reset by peer".into()),
            ScriptedFailure::Unknown => StorageError::BackendError("unexpected response".into()),
            ScriptedFailure::Hang | ScriptedFailure::Stall => {
                StorageError::BackendError("hang".into())
            }
        }
    }
}

#[derive(Debug)]
struct Script {
    name: String,
    failure: ScriptedFailure,
    remaining: usize,
}

/// In-memory object store with scripted failures and a call log.
#[derive(Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, Bytes>>>,
    calls: Arc<Mutex<Vec<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    scripts: Arc<Mutex<Vec<Script>>>,
    pause_after: Arc<Mutex<HashMap<String, UploadHandle>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    abortable: bool,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that honors the cancel token itself.
    pub fn abortable() -> Self {
        Self {
            abortable: true,
            ..Self::default()
        }
    }

    /// Fail every transfer of `name`.
    pub fn fail(&self, name: &str, failure: ScriptedFailure) {
        self.fail_times(name, failure, usize::MAX);
    }

    /// Fail the next `times` transfers of `name`, then succeed.
    pub fn fail_times(&self, name: &str, failure: ScriptedFailure, times: usize) {
        self.scripts.lock().unwrap().push(Script {
            name: name.to_string(),
            failure,
            remaining: times,
        });
    }

    /// Request a pause through `handle` as soon as `name` is stored.
    pub fn pause_after(&self, name: &str, handle: UploadHandle) {
        self.pause_after
            .lock()
            .unwrap()
            .insert(name.to_string(), handle);
    }

    /// Keys passed to `put_object`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|key| key.ends_with(&format!("-{}", name)))
            .count()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Yield until a transfer of `name` has started.
    pub async fn wait_for_transfer(&self, name: &str) {
        while self.calls_for(name) == 0 {
            tokio::task::yield_now().await;
        }
    }

    fn scripted(&self, key: &str) -> Option<ScriptedFailure> {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .iter_mut()
            .find(|s| s.remaining > 0 && key.ends_with(&format!("-{}", s.name)))?;
        if script.remaining != usize::MAX {
            script.remaining -= 1;
        }
        Some(script.failure)
    }

    fn name_of(key: &str) -> &str {
        key.rsplit('/')
            .next()
            .and_then(|segment| segment.split_once('-'))
            .map(|(_, name)| name)
            .unwrap_or(key)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStoreClient for MockObjectStore {
    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        _content_type: &str,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<StoredObject> {
        self.calls.lock().unwrap().push(key.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        progress.on_progress(0);
        tokio::task::yield_now().await;

        match self.scripted(key) {
            Some(hang @ (ScriptedFailure::Hang | ScriptedFailure::Stall)) => {
                if hang == ScriptedFailure::Stall {
                    progress.on_progress(50);
                }
                if self.abortable {
                    cancel.cancelled().await;
                    return Err(StorageError::Aborted);
                }
                std::future::pending::<()>().await;
            }
            Some(failure) => return Err(failure.into_error()),
            None => {}
        }

        for percent in [25, 50, 75, 100] {
            if self.abortable && cancel.is_cancelled() {
                return Err(StorageError::Aborted);
            }
            progress.on_progress(percent);
            tokio::task::yield_now().await;
        }

        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), payload);

        if let Some(handle) = self.pause_after.lock().unwrap().get(Self::name_of(key)) {
            handle.pause();
        }

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("https://store.example.com/{}", key),
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn supports_abort(&self) -> bool {
        self.abortable
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Metadata API double recording every save.
#[derive(Clone, Default)]
pub struct MockMetadataApi {
    saved: Arc<Mutex<Vec<AttachmentMeta>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockMetadataApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject saves for the attachment named `name`.
    pub fn reject(&self, name: &str) {
        self.rejected.lock().unwrap().insert(name.to_string());
    }

    pub fn accept(&self, name: &str) {
        self.rejected.lock().unwrap().remove(name);
    }

    pub fn saved(&self) -> Vec<AttachmentMeta> {
        self.saved.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataApi for MockMetadataApi {
    async fn save(&self, meta: &AttachmentMeta) -> Result<SavedAttachment, MetadataFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().unwrap().contains(&meta.name) {
            return Err(MetadataFailure::with_status("attachment rejected", 422));
        }
        self.saved.lock().unwrap().push(meta.clone());
        Ok(SavedAttachment {
            id: Some(json!(self.saved.lock().unwrap().len())),
            data: None,
        })
    }
}

/// Resource API double answering task creation with a fixed id.
#[derive(Clone)]
pub struct MockResourceApi {
    response: Arc<Mutex<Value>>,
    submissions: Arc<Mutex<Vec<(String, Value)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockResourceApi {
    pub fn new() -> Self {
        Self::with_response(json!({"success": true, "data": {"id": 42}}))
    }

    pub fn with_response(response: Value) -> Self {
        Self {
            response: Arc::new(Mutex::new(response)),
            submissions: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing() -> Self {
        let api = Self::new();
        *api.fail.lock().unwrap() = true;
        api
    }

    pub fn submissions(&self) -> Vec<(String, Value)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceApi for MockResourceApi {
    async fn submit_resource(&self, path: &str, payload: Value) -> Result<Value, UploadError> {
        self.submissions
            .lock()
            .unwrap()
            .push((path.to_string(), payload));
        if *self.fail.lock().unwrap() {
            return Err(UploadError::Resource(
                "API request failed with status 500: boom".into(),
            ));
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Options without pacing or timeout, so tests run at full speed.
pub fn fast_options() -> OrchestratorOptions {
    OrchestratorOptions {
        pacing_delay: Duration::ZERO,
        transfer_timeout: None,
        event_capacity: 1024,
    }
}

pub fn orchestrator(store: &MockObjectStore, metadata: &MockMetadataApi) -> UploadOrchestrator {
    orchestrator_with(store, metadata, fast_options())
}

pub fn orchestrator_with(
    store: &MockObjectStore,
    metadata: &MockMetadataApi,
    options: OrchestratorOptions,
) -> UploadOrchestrator {
    UploadOrchestrator::new(Arc::new(store.clone()), Arc::new(metadata.clone()), options)
}

pub fn mime_for(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        Some("mp4") => "video/mp4",
        Some("doc") => "application/msword",
        _ => "application/octet-stream",
    }
}

pub fn file(name: &str, size: usize) -> NewAttachment {
    NewAttachment::from_bytes(name, mime_for(name), Bytes::from(vec![0u8; size]))
}

/// Queue holding one small file per name, in order.
pub fn queue_of(names: &[&str]) -> AttachmentQueue {
    let mut queue = AttachmentQueue::default();
    for name in names {
        queue.add(file(name, 1024)).unwrap();
    }
    queue
}
