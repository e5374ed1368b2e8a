use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the parent resource (the task) that attachments belong to.
///
/// The backend may return numeric or string ids; both are kept in their
/// textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the created resource id from a REST response.
    ///
    /// Accepts `{"id": ..}` as well as the `{"success": true, "data": {"id": ..}}`
    /// envelope. Empty strings are not valid ids.
    pub fn from_response(response: &Value) -> Option<Self> {
        let id = response
            .get("id")
            .or_else(|| response.get("data").and_then(|data| data.get("id")))?;
        match id {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl Display for ParentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ParentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ParentId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Fields submitted when a task is created. Attachments are uploaded afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl CreateTaskRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}
