//! Error types module
//!
//! Structural errors (`InvalidAttachment`, `InvalidState`) are returned to the
//! caller synchronously. Per-file errors (`TransferFailure`, `MetadataFailure`)
//! are captured on the attachment record and tallied in the run result; they
//! never abort a run.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a single failed file
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Why a transfer to the object store did not complete.
///
/// Closed set: every call site matches each kind exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferFailure {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unknown transfer error: {0}")]
    Unknown(String),
}

impl TransferFailure {
    /// Short cause name shown next to a failed file.
    pub fn cause(&self) -> &'static str {
        match self {
            TransferFailure::AccessDenied(_) => "AccessDenied",
            TransferFailure::NetworkError(_) => "NetworkError",
            TransferFailure::Unknown(_) => "Unknown",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            TransferFailure::AccessDenied(detail)
            | TransferFailure::NetworkError(detail)
            | TransferFailure::Unknown(detail) => detail,
        }
    }
}

/// The object was stored but its metadata could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Metadata save failed: {message}")]
pub struct MetadataFailure {
    pub message: String,
    /// HTTP status returned by the metadata endpoint, when one was received.
    pub status: Option<u16>,
}

impl MetadataFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Transfer(#[from] TransferFailure),

    #[error(transparent)]
    Metadata(#[from] MetadataFailure),

    #[error("Resource request failed: {0}")]
    Resource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for UploadError {
    fn from(err: anyhow::Error) -> Self {
        UploadError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for UploadError {
    fn from(err: io::Error) -> Self {
        UploadError::InternalWithSource {
            message: format!("IO error: {}", err),
            source: err.into(),
        }
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::Resource(format!("JSON error: {}", err))
    }
}

impl UploadError {
    /// Machine-readable error code (e.g., "INVALID_STATE")
    pub fn error_code(&self) -> &'static str {
        match self {
            UploadError::InvalidAttachment(_) => "INVALID_ATTACHMENT",
            UploadError::InvalidState(_) => "INVALID_STATE",
            UploadError::Transfer(TransferFailure::AccessDenied(_)) => "TRANSFER_ACCESS_DENIED",
            UploadError::Transfer(TransferFailure::NetworkError(_)) => "TRANSFER_NETWORK_ERROR",
            UploadError::Transfer(TransferFailure::Unknown(_)) => "TRANSFER_FAILED",
            UploadError::Metadata(_) => "METADATA_FAILED",
            UploadError::Resource(_) => "RESOURCE_FAILED",
            UploadError::Config(_) => "CONFIG_ERROR",
            UploadError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            UploadError::InvalidAttachment(_)
            | UploadError::InvalidState(_)
            | UploadError::Config(_) => false,
            UploadError::Transfer(TransferFailure::AccessDenied(_)) => false,
            UploadError::Transfer(_) | UploadError::Metadata(_) | UploadError::Resource(_) => true,
            UploadError::InternalWithSource { .. } => true,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            UploadError::InvalidAttachment(_) | UploadError::InvalidState(_) => LogLevel::Debug,
            UploadError::Transfer(_) | UploadError::Metadata(_) => LogLevel::Warn,
            UploadError::Resource(_)
            | UploadError::Config(_)
            | UploadError::InternalWithSource { .. } => LogLevel::Error,
        }
    }
}
