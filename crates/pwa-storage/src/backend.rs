//! Bucket store trait

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::key::{MatchOptions, RequestKey};

/// A response as kept in a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Utc::now(),
        }
    }
}

/// Bucket store trait
///
/// A store holds named buckets, each mapping request keys to stored
/// responses. Bucket names are listed in creation order.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Open a bucket, creating it if it does not exist
    async fn open(&self, bucket: &str) -> Result<(), StorageError>;

    /// Check if a bucket exists
    async fn has(&self, bucket: &str) -> Result<bool, StorageError>;

    /// List bucket names in creation order
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Delete a bucket and everything in it
    async fn delete(&self, bucket: &str) -> Result<bool, StorageError>;

    /// Find the first entry in a bucket matching the probe.
    /// A missing bucket yields `None`.
    async fn match_request(
        &self,
        bucket: &str,
        key: &RequestKey,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, StorageError>;

    /// Store a response, replacing any entry with the same key
    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), StorageError>;

    /// List the request keys stored in a bucket
    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, StorageError>;
}

/// Reject entries the Cache API refuses to store
pub(crate) fn check_storable(key: &RequestKey, response: &CachedResponse) -> Result<(), StorageError> {
    if !key.is_get() {
        return Err(StorageError::UnsupportedMethod(key.method.clone()));
    }
    if response.status == 206 {
        return Err(StorageError::PartialResponse(key.url.to_string()));
    }
    Ok(())
}

/// Compute SHA256 of a request key, hex encoded
pub fn key_hash(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.storage_id().as_bytes());
    hex::encode(hasher.finalize())
}
