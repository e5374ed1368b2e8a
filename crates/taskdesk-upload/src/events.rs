//! Upload state-change events.
//!
//! The orchestrator never shares mutable state with its observers. It
//! publishes events on a broadcast channel and the owner of the queue
//! renders from those.

use serde::Serialize;
use taskdesk_core::ParentId;
use tokio::sync::broadcast;

use crate::record::{AttachmentFailure, AttachmentId};
use crate::result::RunResult;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    RunStarted {
        parent_id: ParentId,
        /// Records scheduled for this run.
        total: usize,
    },
    RecordStarted {
        id: AttachmentId,
        name: String,
        /// Position within the scheduled records, starting at 0.
        index: usize,
    },
    Progress {
        id: AttachmentId,
        percent: u8,
        aggregate_percent: u8,
    },
    RecordUploaded {
        id: AttachmentId,
        remote_key: String,
    },
    RecordFailed {
        id: AttachmentId,
        #[serde(serialize_with = "failure_text")]
        failure: AttachmentFailure,
    },
    RunPaused {
        remaining: usize,
    },
    RunCancelled,
    RunFinished(RunResult),
}

fn failure_text<S: serde::Serializer>(
    failure: &AttachmentFailure,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}: {}", failure.cause(), failure))
}

/// Broadcasts upload events to all subscribers.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: broadcast::Sender<UploadEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: UploadEvent) {
        // No active receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(taskdesk_core::UploadConfig::default().event_channel_capacity)
    }
}
