use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ParentId;

/// Metadata persisted for an attachment after its bytes are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub parent_resource_id: ParentId,
    pub key: String,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// Response of a successful metadata save. The backend may echo extra fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedAttachment {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}
