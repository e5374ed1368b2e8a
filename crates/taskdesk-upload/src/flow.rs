use std::sync::Arc;

use taskdesk_core::constants::TASKS_RESOURCE_PATH;
use taskdesk_core::{CreateTaskRequest, ParentId, ResourceApi, UploadError};
use tokio::sync::broadcast;

use crate::control::UploadHandle;
use crate::events::UploadEvent;
use crate::orchestrator::UploadOrchestrator;
use crate::queue::AttachmentQueue;
use crate::record::{AttachmentId, AttachmentRecord, NewAttachment};
use crate::result::RunResult;
use crate::validator::AttachmentValidator;

/// What the caller should do after a submit or resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Task and all attachments are saved; the session can be closed.
    Finalized(RunResult),
    /// The task exists but some attachments are not saved.
    NeedsAttention {
        result: RunResult,
        /// Pending records remain and `resume` may be called.
        can_resume: bool,
    },
}

impl FlowOutcome {
    pub fn result(&self) -> &RunResult {
        match self {
            FlowOutcome::Finalized(result) | FlowOutcome::NeedsAttention { result, .. } => result,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, FlowOutcome::Finalized(_))
    }
}

/// One task creation session: staged files, the created task and its uploads.
///
/// The task is created first; attachments are uploaded under its id. The
/// task is never created twice, a failed or interrupted upload is retried
/// with [`resume`](Self::resume).
pub struct TaskCreationFlow {
    resources: Arc<dyn ResourceApi>,
    orchestrator: UploadOrchestrator,
    queue: AttachmentQueue,
    parent: Option<ParentId>,
}

impl TaskCreationFlow {
    pub fn new(
        resources: Arc<dyn ResourceApi>,
        orchestrator: UploadOrchestrator,
        validator: AttachmentValidator,
    ) -> Self {
        Self {
            resources,
            orchestrator,
            queue: AttachmentQueue::new(validator),
            parent: None,
        }
    }

    /// Session attaching files to a task that already exists.
    pub fn for_existing(
        parent: ParentId,
        resources: Arc<dyn ResourceApi>,
        orchestrator: UploadOrchestrator,
        validator: AttachmentValidator,
    ) -> Self {
        let mut flow = Self::new(resources, orchestrator, validator);
        flow.parent = Some(parent);
        flow
    }

    pub fn select_file(&mut self, file: NewAttachment) -> Result<AttachmentId, UploadError> {
        self.queue.add(file)
    }

    pub fn remove_file(&mut self, id: AttachmentId) -> Result<(), UploadError> {
        self.queue.remove(id).map(|_| ())
    }

    pub fn attachments(&self) -> &[AttachmentRecord] {
        self.queue.list()
    }

    pub fn queue(&self) -> &AttachmentQueue {
        &self.queue
    }

    pub fn parent_id(&self) -> Option<&ParentId> {
        self.parent.as_ref()
    }

    pub fn orchestrator(&self) -> &UploadOrchestrator {
        &self.orchestrator
    }

    pub fn handle(&self) -> UploadHandle {
        self.orchestrator.handle()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.orchestrator.subscribe()
    }

    pub fn pause(&self) {
        self.orchestrator.pause();
    }

    pub fn cancel(&self) {
        self.orchestrator.cancel();
    }

    /// Create the task, then upload every staged attachment under it.
    pub async fn submit(&mut self, request: &CreateTaskRequest) -> Result<FlowOutcome, UploadError> {
        if let Some(parent) = &self.parent {
            return Err(UploadError::InvalidState(format!(
                "Task {} already exists; resume the upload instead",
                parent
            )));
        }

        let payload = serde_json::to_value(request)?;
        let response = self
            .resources
            .submit_resource(TASKS_RESOURCE_PATH, payload)
            .await?;
        let parent = ParentId::from_response(&response).ok_or_else(|| {
            UploadError::Resource("Task creation response did not contain an id".to_string())
        })?;

        tracing::info!(parent_id = %parent, title = %request.title, "Task created");
        let parent = self.parent.insert(parent);

        let result = self.orchestrator.run(&mut self.queue, parent).await;
        Ok(self.conclude(result))
    }

    /// Upload under the existing task without creating it again.
    pub async fn upload(&mut self) -> Result<FlowOutcome, UploadError> {
        let parent = self.parent.as_ref().ok_or_else(|| {
            UploadError::InvalidState("No task exists yet; submit it first".to_string())
        })?;
        let result = self.orchestrator.run(&mut self.queue, parent).await;
        Ok(self.conclude(result))
    }

    /// Clear pause/cancel and retry queued and failed attachments.
    pub async fn resume(&mut self) -> Result<FlowOutcome, UploadError> {
        let result = self
            .orchestrator
            .resume(&mut self.queue, self.parent.as_ref())
            .await?;
        Ok(self.conclude(result))
    }

    /// Discard the session and release every payload. Returns the records as they ended.
    pub fn close(mut self) -> Vec<AttachmentRecord> {
        for record in self.queue.records_mut() {
            record.release_payload();
        }
        let counts = self.queue.counts();
        tracing::debug!(
            parent_id = ?self.parent.as_ref().map(ParentId::as_str),
            uploaded = counts.uploaded,
            failed = counts.failed,
            queued = counts.queued,
            "Task creation session closed"
        );
        self.queue.list().to_vec()
    }

    fn conclude(&self, result: RunResult) -> FlowOutcome {
        if result.success && self.queue.is_complete() {
            return FlowOutcome::Finalized(result);
        }

        let can_resume = self.parent.is_some()
            && self.queue.list().iter().any(|r| r.status().is_pending());
        if result.is_partial_success() {
            tracing::warn!(
                uploaded = result.uploaded,
                failed = result.failed,
                "Task created with some attachments missing"
            );
        }

        FlowOutcome::NeedsAttention { result, can_resume }
    }
}
