use taskdesk_core::{UploadConfig, UploadError};

/// Reasons a file is refused before it enters the queue
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    InvalidContentType {
        content_type: String,
        allowed: Vec<String>,
    },
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError::InvalidAttachment(err.to_string())
    }
}

/// File picker constraints: maximum size and a MIME allowlist.
///
/// Nothing else about a file is checked; empty files and names without an
/// extension are accepted.
#[derive(Debug, Clone)]
pub struct AttachmentValidator {
    max_file_size: u64,
    allowed_content_types: Vec<String>,
}

impl AttachmentValidator {
    pub fn new(max_file_size: u64, allowed_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| ct.to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(
            config.max_attachment_size_bytes,
            config.allowed_content_types.clone(),
        )
    }

    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();

        if !self.allowed_content_types.iter().any(|ct| ct == &normalized) {
            return Err(ValidationError::InvalidContentType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    pub fn validate_all(&self, content_type: &str, file_size: u64) -> Result<(), ValidationError> {
        self.validate_file_size(file_size)?;
        self.validate_content_type(content_type)?;
        Ok(())
    }
}

impl Default for AttachmentValidator {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}
