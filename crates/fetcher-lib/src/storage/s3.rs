//! S3 object storage backend

use super::{async_trait, ObjectStore};
use crate::error::StorageError;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{primitives::ByteStream, Client};
use tracing::debug;

/// S3 bucket holding the datasets
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Create a store using the default AWS credential chain
    pub async fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;

        Self::from_client(Client::new(&config), bucket)
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) => {
                debug!(bucket = %self.bucket, key = %key, "Object does not exist");
                Ok(false)
            }
            Err(e) => Err(StorageError::Backend(format!(
                "HeadObject s3://{}/{}: {:?}",
                self.bucket, key, e
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(format!(
                        "GetObject s3://{}/{}: {:?}",
                        self.bucket, key, e
                    ))
                }
            })?;

        let body = response.body.collect().await.map_err(|e| {
            StorageError::Backend(format!(
                "reading body of s3://{}/{}: {}",
                self.bucket, key, e
            ))
        })?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "PutObject s3://{}/{}: {:?}",
                    self.bucket, key, e
                ))
            })?;

        debug!(bucket = %self.bucket, key = %key, bytes = size, "Uploaded object");
        Ok(())
    }
}
