//! Capability traits for the REST backend
//!
//! The upload core depends on these interfaces only. The API client crate
//! implements them over HTTP; tests provide in-memory doubles.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{MetadataFailure, UploadError};
use crate::models::{AttachmentMeta, SavedAttachment};

/// Generic resource submission (`submitResource(path, payload)`).
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Create a resource under `path` and return the backend's JSON response.
    async fn submit_resource(&self, path: &str, payload: Value) -> Result<Value, UploadError>;
}

/// Persists attachment metadata once per successful transfer.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn save(&self, meta: &AttachmentMeta) -> Result<SavedAttachment, MetadataFailure>;
}
