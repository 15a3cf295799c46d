//! S3 storage service for media assets.
//!
//! Handles all S3 operations including presigned URLs, delete, and object
//! verification. Supports both AWS S3 and MinIO for development.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{AppError, AppResult};

/// Metadata of a stored object, from a HEAD request.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub size: Option<i64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    /// Seconds since the Unix epoch.
    pub last_modified: Option<i64>,
}

/// S3 storage client wrapper.
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    /// Create a new S3 storage client from configuration.
    pub async fn new(config: &StorageSettings) -> AppResult<Self> {
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "vcl");

        let region = Region::new(config.region.clone());

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .force_path_style(true); // Required for MinIO

        // Use custom endpoint for MinIO in development
        if let Some(ref endpoint) = config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let s3_config = s3_config_builder.build();
        let client = Client::from_conf(s3_config);

        let storage = Self {
            client,
            bucket: config.bucket.clone(),
        };

        // Verify bucket exists or create it
        storage.ensure_bucket_exists().await?;

        info!("S3 storage initialized: bucket={}", config.bucket);

        Ok(storage)
    }

    /// Bucket this client reads and writes.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Ensure the bucket exists, creating it if necessary.
    async fn ensure_bucket_exists(&self) -> AppResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("S3 bucket '{}' exists", self.bucket);
                Ok(())
            }
            Err(e) => {
                // Check if it's a "not found" error
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    info!("Creating S3 bucket '{}'", self.bucket);
                    self.client
                        .create_bucket()
                        .bucket(&self.bucket)
                        .send()
                        .await
                        .map_err(|e| {
                            AppError::Storage(format!("Failed to create bucket: {}", e))
                        })?;
                    info!("S3 bucket '{}' created", self.bucket);
                    Ok(())
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to access bucket '{}': {}",
                        self.bucket, service_error
                    )))
                }
            }
        }
    }

    /// Get the content type for a file based on its extension.
    pub fn content_type_for_extension(ext: &str) -> &'static str {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "flac" => "audio/flac",
            "aac" => "audio/aac",
            "ogg" => "audio/ogg",
            "m4a" => "audio/mp4",
            "mp4" => "video/mp4",
            "txt" => "text/plain",
            "md" => "text/markdown",
            "json" => "application/json",
            _ => "application/octet-stream",
        }
    }

    /// Upload an object.
    ///
    /// # Arguments
    /// * `key` - The S3 object key where the file will be uploaded
    /// * `data` - The file contents as bytes
    /// * `content_type` - Optional content type for the upload
    ///
    /// # Returns
    /// The object's ETag when the service reports one.
    pub async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<Option<String>> {
        let body = aws_sdk_s3::primitives::ByteStream::from(data);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let output = request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload object to S3: {}", e)))?;

        Ok(output.e_tag().map(String::from))
    }

    /// Get an object's contents.
    ///
    /// # Returns
    /// The file contents as bytes and content type.
    pub async fn get(&self, key: &str) -> AppResult<(Vec<u8>, Option<String>)> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    AppError::NotFound(format!("Object {}", key))
                } else {
                    AppError::Storage(format!("Failed to get object from S3: {}", service_error))
                }
            })?;

        let content_type = response.content_type().map(String::from);
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to read S3 response body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok((data, content_type))
    }

    /// Delete an object. Succeeds when the key does not exist.
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete object from S3: {}", e)))?;

        Ok(())
    }

    /// HEAD an object. Returns None when the key does not exist.
    pub async fn stat(&self, key: &str) -> AppResult<Option<ObjectInfo>> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(head) => Ok(Some(ObjectInfo {
                size: head.content_length(),
                etag: head.e_tag().map(String::from),
                content_type: head.content_type().map(String::from),
                last_modified: head.last_modified().map(|dt| dt.secs()),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to stat object {}: {}",
                        key, service_error
                    )))
                }
            }
        }
    }

    /// Presigned GET URL for direct browser download.
    pub async fn presigned_get(&self, key: &str, expires_in_secs: u64) -> AppResult<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(|e| AppError::Storage(format!("Invalid presign expiry: {}", e)))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign GET for {}: {}", key, e)))?;

        Ok(presigned.uri().to_string())
    }

    /// Presigned PUT URL for direct browser upload.
    ///
    /// The content type is part of the signature, so the client must send
    /// the identical Content-Type header.
    pub async fn presigned_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in_secs: u64,
    ) -> AppResult<String> {
        let config = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(|e| AppError::Storage(format!("Invalid presign expiry: {}", e)))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(config)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign PUT for {}: {}", key, e)))?;

        Ok(presigned.uri().to_string())
    }

    /// Build the S3 key for a user-uploaded asset.
    ///
    /// # Returns
    /// S3 key in format: users/{user_id}/{asset_type}/{asset_id}.{ext}
    pub fn user_asset_key(
        user_id: Uuid,
        asset_type: crate::models::AssetType,
        asset_id: Uuid,
        ext: &str,
    ) -> String {
        if ext.is_empty() {
            format!("users/{}/{}/{}", user_id, asset_type, asset_id)
        } else {
            format!("users/{}/{}/{}.{}", user_id, asset_type, asset_id, ext)
        }
    }

    /// Build the S3 key for a pipeline-generated file.
    ///
    /// # Returns
    /// S3 key in format: generated/{category}/{job_id}/{filename}
    pub fn generated_key(category: &str, job_id: Uuid, filename: &str) -> String {
        format!("generated/{}/{}/{}", category, job_id, filename)
    }
}
