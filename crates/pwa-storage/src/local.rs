//! Local disk bucket store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{check_storable, key_hash, BucketStore, CachedResponse};
use crate::error::StorageError;
use crate::key::{MatchOptions, RequestKey};

const INDEX_FILE: &str = "buckets.json";

/// Metadata stored next to each response body
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: DateTime<Utc>,
}

/// Bucket names and the keys each bucket holds, oldest first
#[derive(Default)]
struct Index {
    buckets: Vec<String>,
    entries: HashMap<String, Vec<RequestKey>>,
}

/// Local disk bucket store
///
/// Layout:
/// `<base_path>/buckets.json` lists bucket names in creation order,
/// `<base_path>/buckets/<hex name>/<sha256 of key>.{json,body}` holds entries.
///
/// Request keys are loaded once at startup and kept in memory, so a lookup
/// reads at most one entry from disk.
pub struct LocalStore {
    base_path: PathBuf,
    index: Mutex<Index>,
}

impl LocalStore {
    /// Create a new local store, loading the bucket index and keys
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(base_path.join("buckets")).await?;

        let buckets: Vec<String> = match fs::read(base_path.join(INDEX_FILE)).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut entries = HashMap::new();
        let mut total = 0;
        for bucket in &buckets {
            let keys = scan_bucket(&bucket_path(&base_path, bucket)).await?;
            total += keys.len();
            entries.insert(bucket.clone(), keys);
        }

        info!(
            "Initialized local bucket store at {:?} ({} buckets, {} entries)",
            base_path,
            buckets.len(),
            total
        );

        Ok(Self {
            base_path,
            index: Mutex::new(Index { buckets, entries }),
        })
    }

    fn entry_paths(&self, bucket: &str, key: &RequestKey) -> (PathBuf, PathBuf) {
        let dir = bucket_path(&self.base_path, bucket);
        let hash = key_hash(key);
        (
            dir.join(format!("{}.json", hash)),
            dir.join(format!("{}.body", hash)),
        )
    }

    /// Persist the bucket names atomically using a temp file
    async fn save_index(&self, buckets: &[String]) -> Result<(), StorageError> {
        let path = self.base_path.join(INDEX_FILE);
        write_atomic(&path, &serde_json::to_vec_pretty(buckets)?).await
    }

    /// Read one stored entry; `None` if its files are gone
    async fn load(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedResponse>, StorageError> {
        let (meta_path, body_path) = self.entry_paths(bucket, key);

        let Some(meta) = read_meta(&meta_path).await? else {
            warn!("Indexed entry without metadata: {}", key);
            return Ok(None);
        };

        let body = match fs::read(&body_path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Entry metadata without body: {}", meta.key);
                return Ok(None);
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        Ok(Some(CachedResponse {
            status: meta.status,
            headers: meta.headers,
            body,
            stored_at: meta.stored_at,
        }))
    }
}

fn bucket_path(base_path: &Path, bucket: &str) -> PathBuf {
    base_path.join("buckets").join(hex::encode(bucket.as_bytes()))
}

async fn read_meta(path: &Path) -> Result<Option<EntryMeta>, StorageError> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Keys of every readable entry in a bucket directory, oldest first
async fn scan_bucket(dir: &Path) -> Result<Vec<RequestKey>, StorageError> {
    let mut dir = match fs::read_dir(dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::Io(e)),
    };

    let mut metas = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_meta(&path).await {
            Ok(Some(meta)) => metas.push(meta),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable entry {:?}: {}", path, e),
        }
    }

    metas.sort_by(|a, b| {
        a.stored_at
            .cmp(&b.stored_at)
            .then_with(|| a.key.url.as_str().cmp(b.key.url.as_str()))
    });
    Ok(metas.into_iter().map(|m| m.key).collect())
}

/// Write atomically using a uniquely named temp file in the same directory
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
    fs::write(&temp_path, data).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::Io(e));
    }
    Ok(())
}

#[async_trait]
impl BucketStore for LocalStore {
    async fn open(&self, bucket: &str) -> Result<(), StorageError> {
        let mut index = self.index.lock().await;
        fs::create_dir_all(bucket_path(&self.base_path, bucket)).await?;

        if !index.buckets.iter().any(|b| b == bucket) {
            debug!("Creating bucket {}", bucket);
            index.buckets.push(bucket.to_string());
            index.entries.insert(bucket.to_string(), Vec::new());
            self.save_index(&index.buckets).await?;
        }
        Ok(())
    }

    async fn has(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.index.lock().await.buckets.iter().any(|b| b == bucket))
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.index.lock().await.buckets.clone())
    }

    async fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        let Some(pos) = index.buckets.iter().position(|b| b == bucket) else {
            return Ok(false);
        };

        debug!("Deleting bucket {}", bucket);
        match fs::remove_dir_all(bucket_path(&self.base_path, bucket)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }

        index.buckets.remove(pos);
        index.entries.remove(bucket);
        self.save_index(&index.buckets).await?;
        Ok(true)
    }

    async fn match_request(
        &self,
        bucket: &str,
        key: &RequestKey,
        options: MatchOptions,
    ) -> Result<Option<CachedResponse>, StorageError> {
        let stored = {
            let index = self.index.lock().await;
            index
                .entries
                .get(bucket)
                .and_then(|keys| keys.iter().find(|stored| options.matches(stored, key)))
                .cloned()
        };

        match stored {
            Some(stored) => self.load(bucket, &stored).await,
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: RequestKey,
        response: CachedResponse,
    ) -> Result<(), StorageError> {
        check_storable(&key, &response)?;

        let mut index = self.index.lock().await;
        if !index.entries.contains_key(bucket) {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let (meta_path, body_path) = self.entry_paths(bucket, &key);
        debug!("Storing {} ({} bytes) in {}", key, response.body.len(), bucket);

        // Body first: an entry exists once its metadata does
        write_atomic(&body_path, &response.body).await?;

        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers,
            stored_at: response.stored_at,
        };
        write_atomic(&meta_path, &serde_json::to_vec(&meta)?).await?;

        if let Some(keys) = index.entries.get_mut(bucket) {
            keys.retain(|stored| *stored != key);
            keys.push(key);
        }
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, StorageError> {
        self.index
            .lock()
            .await
            .entries
            .get(bucket)
            .cloned()
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(s: &str) -> RequestKey {
        RequestKey::get(Url::parse(s).unwrap())
    }

    fn ok(body: &'static [u8]) -> CachedResponse {
        CachedResponse::new(
            200,
            vec![("content-type".to_string(), "text/css".to_string())],
            Bytes::from_static(body),
        )
    }

    #[tokio::test]
    async fn test_put_and_match_exact() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        store.open("app-v1").await.unwrap();

        store
            .put("app-v1", key("https://a.local/static/app.css"), ok(b"body{}"))
            .await
            .unwrap();

        let hit = store
            .match_request("app-v1", &key("https://a.local/static/app.css"), MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, Bytes::from_static(b"body{}"));
        assert_eq!(
            hit.headers,
            vec![("content-type".to_string(), "text/css".to_string())]
        );
    }

    #[tokio::test]
    async fn test_match_ignoring_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        store.open("b").await.unwrap();
        store
            .put("b", key("https://a.local/static/icon.png"), ok(b"png"))
            .await
            .unwrap();

        let probe = key("https://a.local/static/icon.png?v=2");
        assert!(store
            .match_request("b", &probe, MatchOptions::default())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .match_request("b", &probe, MatchOptions::ignoring_search())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::new(dir.path()).await.unwrap();
            store.open("app-v1").await.unwrap();
            store.open("app-v2").await.unwrap();
            store
                .put("app-v2", key("https://a.local/index.html"), ok(b"<html>"))
                .await
                .unwrap();
        }

        let store = LocalStore::new(dir.path()).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["app-v1", "app-v2"]);
        assert_eq!(store.entries("app-v2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        store.open("old").await.unwrap();
        store
            .put("old", key("https://a.local/index.html"), ok(b"<html>"))
            .await
            .unwrap();

        assert!(store.delete("old").await.unwrap());
        assert!(!store.has("old").await.unwrap());
        assert!(store
            .match_request("old", &key("https://a.local/index.html"), MatchOptions::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete("old").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        store.open("b").await.unwrap();
        store.put("b", key("https://a.local/x.js"), ok(b"one")).await.unwrap();
        store.put("b", key("https://a.local/x.js"), ok(b"two")).await.unwrap();

        assert_eq!(store.entries("b").await.unwrap().len(), 1);
        let hit = store
            .match_request("b", &key("https://a.local/x.js"), MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_reopened_store_answers_from_loaded_keys() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::new(dir.path()).await.unwrap();
            store.open("b").await.unwrap();
            store
                .put("b", key("https://a.local/static/icon.png"), ok(b"png"))
                .await
                .unwrap();
        }

        // A stray file that is not valid metadata is skipped at load
        let bucket_dir = dir.path().join("buckets").join(hex::encode("b"));
        std::fs::write(bucket_dir.join("garbage.json"), b"{not json").unwrap();

        let store = LocalStore::new(dir.path()).await.unwrap();
        assert_eq!(store.entries("b").await.unwrap().len(), 1);

        let hit = store
            .match_request(
                "b",
                &key("https://a.local/static/icon.png?v=9"),
                MatchOptions::ignoring_search(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"png"));
    }

    #[tokio::test]
    async fn test_entry_removed_from_disk_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path()).await.unwrap();
        store.open("b").await.unwrap();
        let k = key("https://a.local/static/app.css");
        store.put("b", k.clone(), ok(b"body{}")).await.unwrap();

        let (meta_path, _) = store.entry_paths("b", &k);
        std::fs::remove_file(meta_path).unwrap();

        assert!(store
            .match_request("b", &k, MatchOptions::default())
            .await
            .unwrap()
            .is_none());
    }
}
