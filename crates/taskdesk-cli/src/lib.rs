use serde::Serialize;
use taskdesk_core::{LogLevel, UploadError};
use taskdesk_upload::{AttachmentRecord, AttachmentStatus, UploadEvent};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// One line of terminal output per event. Progress ticks are shown in 25% steps.
pub fn render_event(event: &UploadEvent) -> Option<String> {
    match event {
        UploadEvent::RunStarted { parent_id, total } => Some(format!(
            "Uploading {} attachment(s) to task {}",
            total, parent_id
        )),
        UploadEvent::RecordStarted { name, index, .. } => {
            Some(format!("[{}] {}", index + 1, truncate_string(name, 48)))
        }
        UploadEvent::Progress {
            percent,
            aggregate_percent,
            ..
        } if percent % 25 == 0 && *percent > 0 => Some(format!(
            "    {:>3}%  (overall {}%)",
            percent, aggregate_percent
        )),
        UploadEvent::Progress { .. } => None,
        UploadEvent::RecordUploaded { remote_key, .. } => {
            Some(format!("    stored as {}", remote_key))
        }
        UploadEvent::RecordFailed { failure, .. } => {
            Some(format!("    failed ({}): {}", failure.cause(), failure))
        }
        UploadEvent::RunPaused { remaining } => {
            Some(format!("Paused, {} attachment(s) remaining", remaining))
        }
        UploadEvent::RunCancelled => Some("Cancelled".to_string()),
        UploadEvent::RunFinished(result) => Some(format!(
            "Finished: {} uploaded, {} failed",
            result.uploaded, result.failed
        )),
    }
}

/// Final state of one attachment, as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct AttachmentSummary {
    pub name: String,
    pub status: AttachmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&AttachmentRecord> for AttachmentSummary {
    fn from(record: &AttachmentRecord) -> Self {
        Self {
            name: record.name().to_string(),
            status: record.status(),
            remote_key: record.remote_key().map(str::to_string),
            error: record
                .failure()
                .map(|f| format!("{}: {}", f.cause(), f)),
        }
    }
}

/// Log an error at the level its kind calls for.
pub fn log_error(error: &UploadError) {
    let error_code = error.error_code();
    let recoverable = error.is_recoverable();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_code, recoverable, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_code, recoverable, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_code, recoverable, "Error occurred");
        }
    }
}

/// Number of records that did not end `Uploaded`.
pub fn not_uploaded(records: &[AttachmentRecord]) -> usize {
    records
        .iter()
        .filter(|r| r.status() != AttachmentStatus::Uploaded)
        .count()
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use taskdesk_core::{AttachmentMeta, MetadataApi, MetadataFailure, ParentId, SavedAttachment};
    use taskdesk_storage::LocalStorage;
    use taskdesk_upload::{
        AttachmentQueue, NewAttachment, OrchestratorOptions, RunResult, UploadOrchestrator,
    };

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_counts_chars() {
        assert_eq!(truncate_string("résumé-final.pdf", 9), "résumé...");
    }

    #[test]
    fn render_run_events() {
        let started = UploadEvent::RunStarted {
            parent_id: ParentId::from("42"),
            total: 3,
        };
        assert_eq!(
            render_event(&started).as_deref(),
            Some("Uploading 3 attachment(s) to task 42")
        );
        assert_eq!(
            render_event(&UploadEvent::RunFinished(RunResult::empty())).as_deref(),
            Some("Finished: 0 uploaded, 0 failed")
        );
        assert_eq!(
            render_event(&UploadEvent::RunPaused { remaining: 2 }).as_deref(),
            Some("Paused, 2 attachment(s) remaining")
        );
    }

    struct RejectNamed(&'static str);

    #[async_trait::async_trait]
    impl MetadataApi for RejectNamed {
        async fn save(&self, meta: &AttachmentMeta) -> Result<SavedAttachment, MetadataFailure> {
            if meta.name == self.0 {
                return Err(MetadataFailure::with_status("rejected", 422));
            }
            Ok(SavedAttachment::default())
        }
    }

    #[tokio::test]
    async fn not_uploaded_counts_across_retries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path(), "http://localhost/files".to_string())
            .await
            .unwrap();
        let orchestrator = UploadOrchestrator::new(
            Arc::new(store),
            Arc::new(RejectNamed("b.png")),
            OrchestratorOptions {
                pacing_delay: Duration::ZERO,
                transfer_timeout: None,
                event_capacity: 64,
            },
        );
        let mut queue = AttachmentQueue::default();
        for name in ["a.png", "b.png", "c.png"] {
            queue
                .add(NewAttachment::from_bytes(name, "image/png", Bytes::from_static(b"png")))
                .unwrap();
        }
        let parent = ParentId::from("7");

        let first = orchestrator.run(&mut queue, &parent).await;
        assert_eq!((first.uploaded, first.failed), (2, 1));
        let retry = orchestrator.resume(&mut queue, Some(&parent)).await.unwrap();
        assert_eq!((retry.uploaded, retry.failed), (0, 1));

        assert_eq!(not_uploaded(queue.list()), 1);
    }
}
