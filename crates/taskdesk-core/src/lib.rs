//! Taskdesk Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! capability traits shared by the storage, API client, upload and CLI crates.

pub mod capabilities;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use capabilities::{MetadataApi, ResourceApi};
pub use config::UploadConfig;
pub use error::{LogLevel, MetadataFailure, TransferFailure, UploadError};
pub use models::{AttachmentMeta, CreateTaskRequest, ParentId, SavedAttachment};
pub use storage_types::StorageBackend;
