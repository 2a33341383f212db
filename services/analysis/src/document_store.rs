use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors that can occur when reading stored documents
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Document {0} not found in storage")]
    NotFound(String),

    #[error("Failed to fetch document {key}: {message}")]
    Fetch { key: String, message: String },

    #[error("Failed to read document body {key}: {message}")]
    Read { key: String, message: String },
}

/// Build the storage key for a user's document
pub fn document_key(user_id: &str, document_id: &str) -> String {
    format!("{}/{}", user_id, document_id)
}

/// Read access to uploaded identity documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;
}

/// Document store backed by an S3 bucket
pub struct S3DocumentStore {
    client: S3Client,
    bucket: String,
}

impl S3DocumentStore {
    /// Create a new S3 document store
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 document store initialized"
        );

        Self::from_client(S3Client::from_conf(s3_config_builder.build()), &config.bucket)
    }

    /// Wrap an already configured client
    pub fn from_client(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for S3DocumentStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        debug!(key = %key, "Fetching document from S3");

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false)
                {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Fetch {
                        key: key.to_string(),
                        message: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
                    }
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Read {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        debug!(key = %key, size_bytes = data.len(), "Document fetched");
        Ok(data)
    }
}
