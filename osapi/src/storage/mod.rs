//! Object storage backends.
//!
//! Handlers and the batch uploader only ever see the [`ObjectStore`] trait. Two backends exist:
//!
//! - [`S3ObjectStore`]: any S3-compatible service through the AWS SDK for Rust
//! - [`InMemoryObjectStore`]: process-local buckets, for development and tests
//!
//! The backend is built once at startup by [`create_object_store`] and shared through
//! `Arc<dyn ObjectStore>`; there is no global client.

pub mod memory;
pub mod s3;

pub use memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;

use crate::config::{StorageBackend, StorageConfig};

#[derive(ThisError, Debug)]
pub enum StorageError {
    /// Bucket name is taken by another account
    #[error("Bucket {bucket} already exists")]
    BucketAlreadyExists { bucket: String },

    /// Bucket already exists and belongs to the caller
    #[error("Bucket {bucket} is already owned by you")]
    BucketAlreadyOwnedByYou { bucket: String },

    #[error("Bucket {bucket} does not exist")]
    NoSuchBucket { bucket: String },

    /// Neither access key nor secret key is configured
    #[error("No credentials found")]
    NoCredentials,

    /// Only one of access key / secret key is configured
    #[error("Incomplete credentials")]
    PartialCredentials,

    /// The backend rejected the configured credentials
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Request could not be built (bad expiry, invalid key...)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl StorageError {
    /// Whether the error is about the service's own credentials rather than the request
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            StorageError::NoCredentials | StorageError::PartialCredentials | StorageError::AccessDenied { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Operations the service needs from an object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Write one object in a single request
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Check whether an object exists. A missing object (or bucket) is `Ok(false)`.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Generate a time-limited URL that lets the holder PUT the given object
    async fn presign_put(&self, bucket: &str, key: &str, content_type: &str, expires_in: Duration) -> Result<String>;
}

/// Create the object store backend selected in configuration
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => {
            tracing::info!(
                endpoint = config.endpoint_url.as_deref().unwrap_or("<aws default>"),
                region = %config.region,
                path_style = config.force_path_style,
                "Creating S3 object store"
            );
            Ok(Arc::new(S3ObjectStore::new(config)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Creating in-memory object store, uploaded data will not survive a restart");
            Ok(Arc::new(InMemoryObjectStore::new()))
        }
    }
}
