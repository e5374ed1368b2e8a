//! Taskdesk Storage Library
//!
//! This crate provides the object storage capability used by the upload
//! orchestrator and its S3 and local filesystem implementations.
//!
//! # Remote key format
//!
//! Keys are scoped by the parent resource: `{parent_id}/{timestamp_millis}-{file_name}`.
//! The timestamp avoids collisions between files of the same name; it is not a
//! content address. Key generation is centralized in the `keys` module so all
//! backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod progress;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::RemoteKeyGenerator;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use progress::{progress_fn, FnProgress, NoOpProgress, ProgressCallback};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use taskdesk_core::StorageBackend;
pub use tokio_util::sync::CancellationToken;
pub use traits::{ObjectStoreClient, StorageError, StorageResult, StoredObject};
