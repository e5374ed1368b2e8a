//! Configuration module
//!
//! Upload, storage and REST client settings read from the environment
//! (a `.env` file is loaded first when present).

use std::env;
use std::time::Duration;

use crate::constants::{
    ALLOWED_ATTACHMENT_CONTENT_TYPES, DEFAULT_API_VERSION, DEFAULT_PACING_DELAY_MS,
    DEFAULT_TRANSFER_TIMEOUT_SECS, MAX_ATTACHMENT_SIZE_BYTES,
};
use crate::error::UploadError;
use crate::storage_types::StorageBackend;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct UploadConfig {
    // REST backend
    pub api_url: String,
    pub api_key: Option<String>,
    pub api_version: String,
    // Object storage
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // File picker constraints
    pub max_attachment_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    // Orchestrator tuning
    pub pacing_delay_ms: u64,
    /// 0 = no bound on a single transfer.
    pub transfer_timeout_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            api_key: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: None,
            local_storage_base_url: None,
            max_attachment_size_bytes: MAX_ATTACHMENT_SIZE_BYTES,
            allowed_content_types: ALLOWED_ATTACHMENT_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pacing_delay_ms: DEFAULT_PACING_DELAY_MS,
            transfer_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => defaults.storage_backend,
        };

        let max_attachment_size_mb = lookup("MAX_ATTACHMENT_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(MAX_ATTACHMENT_SIZE_BYTES / (1024 * 1024));

        let allowed_content_types = lookup("ALLOWED_ATTACHMENT_TYPES")
            .map(|s| {
                s.split(',')
                    .map(|ct| ct.trim().to_lowercase())
                    .filter(|ct| !ct.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_content_types);

        let config = UploadConfig {
            api_url: lookup("TASKDESK_API_URL")
                .or_else(|| lookup("API_URL"))
                .unwrap_or(defaults.api_url),
            api_key: lookup("TASKDESK_API_KEY")
                .or_else(|| lookup("API_KEY"))
                .filter(|s| !s.is_empty()),
            api_version: lookup("TASKDESK_API_VERSION").unwrap_or(defaults.api_version),
            storage_backend,
            s3_bucket: lookup("S3_BUCKET").filter(|s| !s.is_empty()),
            s3_region: lookup("S3_REGION").filter(|s| !s.is_empty()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|s| !s.is_empty()),
            aws_region: lookup("AWS_REGION").filter(|s| !s.is_empty()),
            local_storage_path: lookup("LOCAL_STORAGE_PATH").filter(|s| !s.is_empty()),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL").filter(|s| !s.is_empty()),
            max_attachment_size_bytes: max_attachment_size_mb.saturating_mul(1024 * 1024),
            allowed_content_types,
            pacing_delay_ms: lookup("UPLOAD_PACING_DELAY_MS")
                .unwrap_or_else(|| DEFAULT_PACING_DELAY_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_PACING_DELAY_MS),
            transfer_timeout_secs: lookup("UPLOAD_TRANSFER_TIMEOUT_SECS")
                .unwrap_or_else(|| DEFAULT_TRANSFER_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_TRANSFER_TIMEOUT_SECS),
            event_channel_capacity: lookup("UPLOAD_EVENT_CAPACITY")
                .and_then(|s| s.parse().ok())
                .filter(|&c: &usize| c > 0)
                .unwrap_or(EVENT_CHANNEL_CAPACITY),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        let invalid = |message: &str| Err(UploadError::Config(message.to_string()));

        if self.max_attachment_size_bytes == 0 {
            return invalid("MAX_ATTACHMENT_SIZE_MB must be greater than zero");
        }

        if self.allowed_content_types.is_empty() {
            return invalid("ALLOWED_ATTACHMENT_TYPES must list at least one content type");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return invalid("TASKDESK_API_URL must be an http(s) URL");
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return invalid("S3_BUCKET must be set when using S3 storage backend");
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return invalid(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend",
                    );
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return invalid(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend",
                    );
                }
                if self.local_storage_base_url.is_none() {
                    return invalid(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend",
                    );
                }
            }
        }

        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        if self.transfer_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.transfer_timeout_secs))
        }
    }

    pub fn s3_region_or_default(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}
