//! Bucket store with injectable failures, for tests

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{BucketStore, CachedResponse};
use crate::error::StorageError;
use crate::key::{MatchOptions, RequestKey};
use crate::memory::MemoryStore;

/// In-memory store whose lookups and writes can be made to fail
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `match_request` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `put` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(io::Error::other(format!("injected {} failure", what)))
    }
}

#[async_trait]
impl BucketStore for FaultyStore {
    async fn open(&self, bucket: &str) -> Result<(), StorageError> {
        self.inner.open(bucket).await
    }

    async fn has(&self, bucket: &str) -> Result<bool, StorageError> {
        self.inner.has(bucket).await
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys().await
    }

    async fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        self.inner.delete(bucket).await
    }

    async fn match_request(
        &self,
        bucket: &str,
        key: &RequestKey,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::injected("read"));
        }
        self.inner.match_request(bucket, key, options).await
    }

    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::injected("write"));
        }
        self.inner.put(bucket, key, response).await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, StorageError> {
        self.inner.entries(bucket).await
    }
}
