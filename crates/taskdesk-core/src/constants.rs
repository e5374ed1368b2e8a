//! Application-wide constants.

/// Upper bound enforced by the file picker before a file may enter a queue (250 MiB).
pub const MAX_ATTACHMENT_SIZE_BYTES: u64 = 250 * 1024 * 1024;

/// Content types accepted as task attachments: JPEG, PNG, PDF, DOC, DOCX and MP4.
pub const ALLOWED_ATTACHMENT_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "video/mp4",
];

/// Extensions matching [`ALLOWED_ATTACHMENT_CONTENT_TYPES`].
pub const ALLOWED_ATTACHMENT_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "pdf", "doc", "docx", "mp4"];

/// Default delay inserted between successful transfers.
pub const DEFAULT_PACING_DELAY_MS: u64 = 500;

/// Default upper bound for a single file transfer. `0` disables the bound.
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 300;

/// REST collection the parent task is created in.
pub const TASKS_RESOURCE_PATH: &str = "tasks";

/// Default REST API version segment (`/api/{version}`).
pub const DEFAULT_API_VERSION: &str = "v1";
