//! Taskdesk Upload Library
//!
//! Staged, resumable, sequential attachment uploads for task creation.
//!
//! - [`AttachmentQueue`] holds the files a user selected, validated against
//!   the picker constraints.
//! - [`UploadOrchestrator`] uploads pending records one at a time through an
//!   [`ObjectStoreClient`](taskdesk_storage::ObjectStoreClient), persists
//!   metadata through a [`MetadataApi`](taskdesk_core::MetadataApi), and can
//!   be paused, cancelled and resumed.
//! - [`TaskCreationFlow`] creates the parent task first and then drives the
//!   orchestrator under its id.

pub mod control;
pub mod events;
pub mod flow;
pub mod orchestrator;
pub mod queue;
pub mod record;
pub mod result;
pub mod validator;

pub use control::UploadHandle;
pub use events::{EventSink, UploadEvent};
pub use flow::{FlowOutcome, TaskCreationFlow};
pub use orchestrator::{OrchestratorOptions, UploadOrchestrator};
pub use queue::{AttachmentQueue, QueueCounts};
pub use record::{
    AttachmentFailure, AttachmentId, AttachmentPayload, AttachmentRecord, AttachmentStatus,
    NewAttachment,
};
pub use result::{RunOutcome, RunResult, RunStop};
pub use validator::{AttachmentValidator, ValidationError};
