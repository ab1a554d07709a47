use super::{ObjectStore, Result, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// An object as held by [`InMemoryObjectStore`]
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Process-local object store.
/// Mirrors S3 semantics closely enough for development: buckets must exist before objects are
/// written to them and bucket names are unique.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an object back (not part of [`ObjectStore`], used for inspection)
    pub async fn get_object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets.read().await.get(bucket).and_then(|objects| objects.get(key)).cloned()
    }

    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets.read().await.get(bucket).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(StorageError::BucketAlreadyOwnedByYou {
                bucket: bucket.to_string(),
            });
        }
        buckets.insert(bucket.to_string(), HashMap::new());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, content_type: Option<&str>) -> Result<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or_else(|| StorageError::NoSuchBucket {
            bucket: bucket.to_string(),
        })?;

        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self
            .buckets
            .read()
            .await
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }

    async fn presign_put(&self, bucket: &str, key: &str, content_type: &str, expires_in: Duration) -> Result<String> {
        let mut url = Url::parse("memory://localhost/").map_err(|e| StorageError::Backend { message: e.to_string() })?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Backend {
                message: "memory URL cannot be a base".to_string(),
            })?
            .push(bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("content-type", content_type)
            .append_pair("expires-in", &expires_in.as_secs().to_string());
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = InMemoryObjectStore::new();

        store.create_bucket("images").await.unwrap();
        assert!(!store.object_exists("images", "a.png").await.unwrap());

        store
            .put_object("images", "a.png", Bytes::from_static(b"png"), Some("image/png"))
            .await
            .unwrap();

        assert!(store.object_exists("images", "a.png").await.unwrap());
        let stored = store.get_object("images", "a.png").await.unwrap();
        assert_eq!(stored.body, Bytes::from_static(b"png"));
        assert_eq!(stored.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_create_existing_bucket_is_conflict() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("dup").await.unwrap();

        let result = store.create_bucket("dup").await;
        assert!(matches!(result, Err(StorageError::BucketAlreadyOwnedByYou { bucket }) if bucket == "dup"));
    }

    #[tokio::test]
    async fn test_put_into_missing_bucket_fails() {
        let store = InMemoryObjectStore::new();

        let result = store.put_object("nowhere", "k", Bytes::new(), None).await;
        assert!(matches!(result, Err(StorageError::NoSuchBucket { .. })));
        // A missing bucket just means the object does not exist
        assert!(!store.object_exists("nowhere", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("b").await.unwrap();

        store.put_object("b", "k", Bytes::from_static(b"first"), None).await.unwrap();
        store.put_object("b", "k", Bytes::from_static(b"second"), None).await.unwrap();

        assert_eq!(store.object_count("b").await, 1);
        assert_eq!(store.get_object("b", "k").await.unwrap().body, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn test_presign_put_encodes_location_and_expiry() {
        let store = InMemoryObjectStore::new();

        let url = store
            .presign_put("b", "dir/file name.txt", "text/plain", Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(url.starts_with("memory://localhost/b/dir/file%20name.txt?"), "unexpected url {url}");
        assert!(url.contains("expires-in=3600"));
        assert!(url.contains("content-type=text%2Fplain"));
    }
}
