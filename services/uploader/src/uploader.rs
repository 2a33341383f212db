use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Errors that can occur while uploading a document
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot derive an object name from {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Storage {
        bucket: String,
        key: String,
        #[source]
        source: ObjectStoreError,
    },
}

/// Errors reported by an object store
#[derive(Error, Debug, Clone)]
pub enum ObjectStoreError {
    #[error("Bucket {0} does not exist")]
    NoSuchBucket(String),

    #[error("{0}")]
    Request(String),
}

/// Where a document ended up
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    pub object_name: String,
    pub size_bytes: usize,
}

/// Write access to object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;
}

/// Object store backed by S3
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
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

        info!(region = %config.region, "S3 client initialized");

        Self {
            client: S3Client::from_conf(s3_config_builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().and_then(|e| e.code()) == Some("NoSuchBucket") {
                    ObjectStoreError::NoSuchBucket(bucket.to_string())
                } else {
                    ObjectStoreError::Request(
                        aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
                    )
                }
            })?;

        Ok(())
    }
}

/// Uploads local identity documents under a per-user prefix
pub struct DocumentUploader {
    store: Arc<dyn ObjectStore>,
}

impl DocumentUploader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `file_path` to `{user_id}/{object_name}` in `bucket`.
    ///
    /// When `object_name` is `None` the file's base name is used.
    #[instrument(skip(self, file_path), fields(file = %file_path.display()))]
    pub async fn upload(
        &self,
        file_path: &Path,
        bucket: &str,
        user_id: &str,
        object_name: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let result = self.try_upload(file_path, bucket, user_id, object_name).await;

        if let Err(ref e) = result {
            error!(error = %e, "Error uploading file to S3");
        }

        result
    }

    async fn try_upload(
        &self,
        file_path: &Path,
        bucket: &str,
        user_id: &str,
        object_name: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let object_name = match object_name {
            Some(name) => name.to_string(),
            None => derive_object_name(file_path)?,
        };
        let key = format!("{}/{}", user_id, object_name);

        let data = tokio::fs::read(file_path)
            .await
            .map_err(|source| UploadError::File {
                path: file_path.to_path_buf(),
                source,
            })?;
        let size_bytes = data.len();
        let content_type = get_content_type(file_path);

        debug!(
            bucket = %bucket,
            key = %key,
            size_bytes = size_bytes,
            content_type = content_type,
            "Uploading document"
        );

        self.store
            .put_object(bucket, &key, data, content_type)
            .await
            .map_err(|source| UploadError::Storage {
                bucket: bucket.to_string(),
                key: key.clone(),
                source,
            })?;

        info!(bucket = %bucket, key = %key, size_bytes = size_bytes, "Document uploaded");

        Ok(UploadReceipt {
            bucket: bucket.to_string(),
            key,
            object_name,
            size_bytes,
        })
    }
}

/// Object name used when none is given: the file's base name
pub fn derive_object_name(file_path: &Path) -> Result<String, UploadError> {
    file_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(String::from)
        .ok_or_else(|| UploadError::InvalidPath(file_path.to_path_buf()))
}

/// Content type for a document, from its file extension
fn get_content_type(file_path: &Path) -> &'static str {
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Object store keeping uploads in memory
    #[derive(Default)]
    pub(crate) struct InMemoryObjectStore {
        pub objects: Mutex<HashMap<(String, String), (Vec<u8>, String)>>,
        pub fail_with: Option<ObjectStoreError>,
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            data: Vec<u8>,
            content_type: &str,
        ) -> Result<(), ObjectStoreError> {
            if let Some(ref err) = self.fail_with {
                return Err(err.clone());
            }
            self.objects.lock().await.insert(
                (bucket.to_string(), key.to_string()),
                (data, content_type.to_string()),
            );
            Ok(())
        }
    }

    pub(crate) fn document_file(name: &str, data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(data).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_upload_derives_object_name_from_file() {
        let (_dir, path) = document_file("id1235.jpg", &[0xFF, 0xD8, 0xFF]);
        let store = Arc::new(InMemoryObjectStore::default());
        let uploader = DocumentUploader::new(store.clone());

        let receipt = assert_ok!(uploader.upload(&path, "kyc-docs", "user1235", None).await);

        assert_eq!(receipt.key, "user1235/id1235.jpg");
        assert_eq!(receipt.object_name, "id1235.jpg");
        assert_eq!(receipt.size_bytes, 3);

        let objects = store.objects.lock().await;
        let (data, content_type) = &objects[&("kyc-docs".to_string(), "user1235/id1235.jpg".to_string())];
        assert_eq!(data, &vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_with_explicit_object_name() {
        let (_dir, path) = document_file("id1235.jpg", b"jpeg");
        let store = Arc::new(InMemoryObjectStore::default());
        let uploader = DocumentUploader::new(store.clone());

        let receipt = assert_ok!(
            uploader
                .upload(&path, "kyc-docs", "user1235", Some("id1235"))
                .await
        );

        assert_eq!(receipt.key, "user1235/id1235");
        assert!(store
            .objects
            .lock()
            .await
            .contains_key(&("kyc-docs".to_string(), "user1235/id1235".to_string())));
    }

    #[tokio::test]
    async fn test_upload_storage_error() {
        let (_dir, path) = document_file("id1235.jpg", b"jpeg");
        let store = Arc::new(InMemoryObjectStore {
            fail_with: Some(ObjectStoreError::NoSuchBucket("missing-bucket".to_string())),
            ..Default::default()
        });
        let uploader = DocumentUploader::new(store);

        let err = assert_err!(uploader.upload(&path, "missing-bucket", "user1235", None).await);

        match err {
            UploadError::Storage { ref key, ref source, .. } => {
                assert_eq!(key, "user1235/id1235.jpg");
                assert!(matches!(source, ObjectStoreError::NoSuchBucket(b) if b == "missing-bucket"));
            }
            ref other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Bucket missing-bucket does not exist"));
    }

    #[tokio::test]
    async fn test_upload_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryObjectStore::default());
        let uploader = DocumentUploader::new(store.clone());

        let err = assert_err!(
            uploader
                .upload(&dir.path().join("absent.jpg"), "kyc-docs", "user1235", None)
                .await
        );

        assert!(matches!(err, UploadError::File { .. }));
        assert!(store.objects.lock().await.is_empty());
    }

    #[test]
    fn test_derive_object_name() {
        assert_eq!(
            derive_object_name(Path::new("ids/id1235.jpg")).unwrap(),
            "id1235.jpg"
        );
        assert!(derive_object_name(Path::new("/")).is_err());
    }

    #[test]
    fn test_get_content_type() {
        assert_eq!(get_content_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(get_content_type(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(get_content_type(Path::new("a.png")), "image/png");
        assert_eq!(get_content_type(Path::new("scan.pdf")), "application/pdf");
        assert_eq!(get_content_type(Path::new("noext")), "application/octet-stream");
    }
}
