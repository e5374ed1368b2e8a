//! Domain methods for the taskdesk API client.
//!
//! Also implements the `ResourceApi` and `MetadataApi` capabilities so the
//! upload core can run against the real backend.

use crate::{status_of, ApiClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use taskdesk_core::constants::TASKS_RESOURCE_PATH;
use taskdesk_core::{
    AttachmentMeta, MetadataApi, MetadataFailure, ParentId, ResourceApi, SavedAttachment,
    UploadError,
};

impl ApiClient {
    /// Path of a resource collection under the API prefix.
    pub fn resource_path(&self, resource: &str) -> String {
        format!("{}/{}", self.api_prefix(), resource.trim_matches('/'))
    }

    /// Path of the attachment collection of a task.
    pub fn attachments_path(&self, parent: &ParentId) -> String {
        format!(
            "{}/{}/{}/attachments",
            self.api_prefix(),
            TASKS_RESOURCE_PATH,
            urlencoding::encode(parent.as_str())
        )
    }

    /// Persist metadata for an attachment that is already stored.
    pub async fn save_attachment_metadata(&self, meta: &AttachmentMeta) -> Result<SavedAttachment> {
        let response: Value = self
            .post_json(&self.attachments_path(&meta.parent_resource_id), meta)
            .await?;

        if response.get("success").and_then(Value::as_bool) == Some(false) {
            let message = response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("backend reported failure");
            return Err(anyhow::anyhow!("Attachment metadata rejected: {}", message));
        }

        if response.is_null() {
            return Ok(SavedAttachment::default());
        }

        serde_json::from_value(response).context("Failed to parse attachment metadata response")
    }
}

#[async_trait]
impl ResourceApi for ApiClient {
    async fn submit_resource(&self, path: &str, payload: Value) -> Result<Value, UploadError> {
        self.post_json(&self.resource_path(path), &payload)
            .await
            .map_err(|e| {
                let err = UploadError::Resource(format!("{:#}", e));
                tracing::error!(
                    error = %err,
                    error_code = err.error_code(),
                    status = ?status_of(&e),
                    path = %path,
                    "Resource submission failed"
                );
                err
            })
    }
}

#[async_trait]
impl MetadataApi for ApiClient {
    async fn save(&self, meta: &AttachmentMeta) -> Result<SavedAttachment, MetadataFailure> {
        self.save_attachment_metadata(meta).await.map_err(|e| {
            let message = format!("{:#}", e);
            match status_of(&e) {
                Some(status) => MetadataFailure::with_status(message, status),
                None => MetadataFailure::new(message),
            }
        })
    }
}
