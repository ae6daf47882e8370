//! In-memory bucket store

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::{check_storable, BucketStore, CachedResponse};
use crate::error::StorageError;
use crate::key::{MatchOptions, RequestKey};

struct Bucket {
    name: String,
    entries: Vec<(RequestKey, CachedResponse)>,
}

/// In-memory bucket store
///
/// Buckets and their entries keep insertion order, so matches resolve to
/// the oldest matching entry the same way the disk store does.
#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<Vec<Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn open(&self, bucket: &str) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write();
        if !buckets.iter().any(|b| b.name == bucket) {
            debug!("Creating bucket {}", bucket);
            buckets.push(Bucket {
                name: bucket.to_string(),
                entries: Vec::new(),
            });
        }
        Ok(())
    }

    async fn has(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.buckets.read().iter().any(|b| b.name == bucket))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.buckets.read().iter().map(|b| b.name.clone()).collect())
    }

    async fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        let mut buckets = self.buckets.write();
        let before = buckets.len();
        buckets.retain(|b| b.name != bucket);
        Ok(buckets.len() != before)
    }

    async fn match_request(
        &self,
        bucket: &str,
        key: &RequestKey,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, StorageError> {
        let buckets = self.buckets.read();
        Ok(buckets
            .iter()
            .find(|b| b.name == bucket)
            .and_then(|b| {
                b.entries
                    .iter()
                    .find(|(stored, _)| options.matches(stored, key))
            })
            .map(|(_, response)| response.clone()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), StorageError> {
        check_storable(&key, &response)?;

        let mut buckets = self.buckets.write();
        let target = buckets
            .iter_mut()
            .find(|b| b.name == bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;

        target.entries.retain(|(stored, _)| *stored != key);
        target.entries.push((key, response));
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, StorageError> {
        let buckets = self.buckets.read();
        let target = buckets
            .iter()
            .find(|b| b.name == bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        Ok(target.entries.iter().map(|(k, _)| k.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;

    fn key(s: &str) -> RequestKey {
        RequestKey::get(Url::parse(s).unwrap())
    }

    fn ok(body: &'static str) -> CachedResponse {
        CachedResponse::new(200, vec![], Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_ordered() {
        let store = MemoryStore::new();
        store.open("app-v1").await.unwrap();
        store.open("app-v2").await.unwrap();
        store.open("app-v1").await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["app-v1", "app-v2"]);
    }

    #[tokio::test]
    async fn test_put_replaces_same_key() {
        let store = MemoryStore::new();
        store.open("b").await.unwrap();
        store.put("b", key("https://a.local/x.js"), ok("one")).await.unwrap();
        store.put("b", key("https://a.local/x.js"), ok("two")).await.unwrap();

        assert_eq!(store.entries("b").await.unwrap().len(), 1);
        let hit = store
            .match_request("b", &key("https://a.local/x.js"), MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_put_into_missing_bucket_fails() {
        let store = MemoryStore::new();
        let result = store.put("nope", key("https://a.local/x.js"), ok("x")).await;
        assert!(matches!(result, Err(StorageError::BucketNotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_non_get_and_partial() {
        let store = MemoryStore::new();
        store.open("b").await.unwrap();

        let post = RequestKey::new("POST", Url::parse("https://a.local/api").unwrap());
        assert!(matches!(
            store.put("b", post, ok("x")).await,
            Err(StorageError::UnsupportedMethod(_))
        ));

        let partial = CachedResponse::new(206, vec![], Bytes::new());
        assert!(matches!(
            store.put("b", key("https://a.local/video.mp4"), partial).await,
            Err(StorageError::PartialResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_match_missing_bucket_is_none() {
        let store = MemoryStore::new();
        let hit = store
            .match_request("gone", &key("https://a.local/"), MatchOptions::default())
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store.open("old").await.unwrap();
        assert!(store.delete("old").await.unwrap());
        assert!(!store.delete("old").await.unwrap());
        assert!(!store.has("old").await.unwrap());
    }
}
