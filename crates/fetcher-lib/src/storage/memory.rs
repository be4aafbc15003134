//! In-memory object storage used as a test double

use super::{async_trait, ObjectStore};
use crate::error::StorageError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store backed by a shared in-memory map
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    fail_puts: Arc<RwLock<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly
    pub async fn insert(&self, key: impl Into<String>, body: impl Into<Vec<u8>>) {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.into(),
            StoredObject {
                body: body.into(),
                content_type: super::CSV_CONTENT_TYPE.to_string(),
            },
        );
    }

    /// Current object under `key`, if any
    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    /// Body of `key` decoded as UTF-8, if present
    pub async fn text(&self, key: &str) -> Option<String> {
        self.object(key)
            .await
            .map(|o| String::from_utf8_lossy(&o.body).into_owned())
    }

    /// Keys currently stored, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Make subsequent writes fail, leaving stored objects untouched
    pub async fn set_fail_puts(&self, fail: bool) {
        *self.fail_puts.write().await = fail;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if *self.fail_puts.read().await {
            return Err(StorageError::Backend(format!("write to {} rejected", key)));
        }

        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
