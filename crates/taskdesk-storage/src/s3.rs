use crate::progress::{percent_of, ProgressCallback};
use crate::traits::{ObjectStoreClient, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    MultipartUpload, ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult,
};
use tokio_util::sync::CancellationToken;

/// Payloads at or above this size are sent as a multipart upload, one part at a time.
/// S3 requires every part but the last to be at least 5 MiB.
const MULTIPART_PART_SIZE: usize = 8 * 1024 * 1024;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
        })
    }

    /// Public URL for an object.
    ///
    /// Path-style `{endpoint}/{bucket}/{key}` for S3-compatible providers,
    /// virtual-hosted style for AWS.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }

    async fn put_single(&self, location: &Path, payload: Bytes) -> StorageResult<()> {
        let result: ObjectResult<_> = self.store.put(location, PutPayload::from(payload)).await;
        result.map(|_| ()).map_err(classify_error)
    }

    async fn put_parts(
        &self,
        location: &Path,
        payload: Bytes,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        let mut upload: Box<dyn MultipartUpload> = self
            .store
            .put_multipart(location)
            .await
            .map_err(classify_error)?;

        match send_parts(upload.as_mut(), &payload, progress, cancel).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        bucket = %self.bucket,
                        key = %location,
                        "S3 multipart abort failed"
                    );
                }
                Err(e)
            }
        }
    }
}

async fn send_parts(
    upload: &mut dyn MultipartUpload,
    payload: &Bytes,
    progress: &dyn ProgressCallback,
    cancel: &CancellationToken,
) -> StorageResult<()> {
    let total = payload.len() as u64;
    let mut sent: u64 = 0;

    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + MULTIPART_PART_SIZE).min(payload.len());
        let part = upload.put_part(PutPayload::from(payload.slice(offset..end)));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StorageError::Aborted),
            result = part => result.map_err(classify_error)?,
        }

        sent += (end - offset) as u64;
        offset = end;
        progress.on_progress(percent_of(sent, total));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Aborted),
        result = upload.complete() => result.map(|_| ()).map_err(classify_error),
    }
}

/// Map an object store error onto the storage error taxonomy.
fn classify_error(err: ObjectStoreError) -> StorageError {
    match err {
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            StorageError::AccessDenied(err.to_string())
        }
        // Transport and HTTP failures surface as Generic from the S3 client.
        ObjectStoreError::Generic { .. } => StorageError::Network(err.to_string()),
        other => StorageError::BackendError(other.to_string()),
    }
}

#[async_trait]
impl ObjectStoreClient for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        _content_type: &str,
        progress: &dyn ProgressCallback,
        cancel: &CancellationToken,
    ) -> StorageResult<StoredObject> {
        let size = payload.len() as u64;
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        progress.on_progress(0);

        let result = if payload.len() < MULTIPART_PART_SIZE {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StorageError::Aborted),
                result = self.put_single(&location, payload) => result,
            }
        } else {
            self.put_parts(&location, payload, progress, cancel).await
        };

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put_object failed"
            );
            e
        })?;

        progress.on_progress(100);

        let url = self.generate_url(key);

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url,
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn supports_abort(&self) -> bool {
        true
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
