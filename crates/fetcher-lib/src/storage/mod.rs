//! Durable dataset storage
//!
//! This module provides:
//! - An object storage abstraction with S3 and in-memory backends
//! - The append-only dataset merge engine
//! - A best-effort local mirror of written datasets

mod dataset;
mod memory;
mod mirror;
mod s3;


pub use dataset::{DatasetStore, MergeOutcome, CSV_CONTENT_TYPE};
pub use memory::{MemoryStore, StoredObject};
pub use mirror::LocalMirror;
pub use s3::S3Store;

use crate::error::StorageError;

pub use async_trait::async_trait;

/// Trait for object storage backends holding datasets
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists under `key`. Absence is not an error.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Fetch the full body of the object under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace the object under `key` in a single write
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
}
