//! Content-addressed response cache
//!
//! Layout: `{root}/{digest[0:2]}/{digest}_{position}.json`, where `digest`
//! is the BLAKE3 hex of the fingerprint string. Entries never expire; a
//! changed source file or setting gets a new fingerprint instead. Each
//! entry also records the digest of the request it answered, and a lookup
//! with a different digest is a miss.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sift_core::Fingerprint;
use time::OffsetDateTime;
use tracing::debug;

use crate::{Result, StorageError};

/// One stored model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub position: usize,
    /// Digest of the prompt, chunk content and model the reply answered
    #[serde(default)]
    pub request_digest: String,
    pub response: String,
    #[serde(with = "time::serde::timestamp")]
    pub stored_at: OffsetDateTime,
}

/// Durable store of model replies keyed by (fingerprint, chunk position).
///
/// Distinct keys map to distinct files, so concurrent workers never contend.
/// Writes go through a temp file and a rename: two writers racing on one key
/// leave one complete entry behind.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Platform cache directory (`~/.cache/sift/responses` on Linux)
    pub fn default_root() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "sift", "sift") {
            dirs.cache_dir().join("responses")
        } else {
            PathBuf::from("cache")
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached reply for a chunk, if one was stored for the same request
    pub async fn get(
        &self,
        fingerprint: &Fingerprint,
        position: usize,
        request_digest: &str,
    ) -> Result<Option<String>> {
        let path = self.path_for(fingerprint, position);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;

        if entry.fingerprint != fingerprint.as_str() || entry.position != position {
            debug!("Ignoring cache entry {:?} stored for another key", path);
            return Ok(None);
        }
        if entry.request_digest != request_digest {
            debug!("Ignoring stale cache entry {:?}: request changed", path);
            return Ok(None);
        }

        Ok(Some(entry.response))
    }

    /// Store a chunk reply, replacing any previous entry for the key
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        position: usize,
        request_digest: &str,
        response: &str,
    ) -> Result<()> {
        let path = self.path_for(fingerprint, position);
        if let Some(shard) = path.parent() {
            tokio::fs::create_dir_all(shard).await?;
        }

        let entry = CacheEntry {
            fingerprint: fingerprint.as_str().to_string(),
            position,
            request_digest: request_digest.to_string(),
            response: response.to_string(),
            stored_at: OffsetDateTime::now_utc(),
        };
        let content = serde_json::to_vec_pretty(&entry)?;

        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        Ok(())
    }

    pub fn exists(&self, fingerprint: &Fingerprint, position: usize) -> bool {
        self.path_for(fingerprint, position).exists()
    }

    /// Remove every entry; returns the number of files deleted
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut shards = match tokio::fs::read_dir(&self.root).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(shard.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
            tokio::fs::remove_dir(shard.path()).await?;
        }

        Ok(removed)
    }

    /// File holding the entry for a key, whether or not it exists yet
    pub fn path_for(&self, fingerprint: &Fingerprint, position: usize) -> PathBuf {
        let digest = fingerprint.digest();
        self.root
            .join(&digest[..2])
            .join(format!("{}_{}.json", digest, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "request";

    fn fingerprint() -> Fingerprint {
        Fingerprint::from_raw("survey.xlsx|opinion||category|create_category|abc")
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().join("responses")).unwrap();
        let fp = fingerprint();

        assert_eq!(cache.get(&fp, 0, DIGEST).await.unwrap(), None);
        assert!(!cache.exists(&fp, 0));

        cache.put(&fp, 0, DIGEST, "1: 만족\n2: 의견").await.unwrap();

        assert!(cache.exists(&fp, 0));
        assert_eq!(
            cache.get(&fp, 0, DIGEST).await.unwrap().as_deref(),
            Some("1: 만족\n2: 의견")
        );
        assert_eq!(cache.get(&fp, 1, DIGEST).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let fp = fingerprint();

        {
            let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
            cache.put(&fp, 3, DIGEST, "7: 무의견").await.unwrap();
        }

        let reopened = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get(&fp, 3, DIGEST).await.unwrap().as_deref(), Some("7: 무의견"));
    }

    #[tokio::test]
    async fn test_fingerprints_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let other = Fingerprint::from_raw("other.xlsx|opinion||category|create_category|abc");

        cache.put(&fingerprint(), 0, DIGEST, "1: 만족").await.unwrap();
        assert_eq!(cache.get(&other, 0, DIGEST).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        cache.put(&fp, 0, DIGEST, "first").await.unwrap();
        cache.put(&fp, 0, DIGEST, "second").await.unwrap();
        assert_eq!(cache.get(&fp, 0, DIGEST).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_concurrent_writers_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        let mut handles = Vec::new();
        for position in 0..16 {
            let cache = cache.clone();
            let fp = fp.clone();
            handles.push(tokio::spawn(async move {
                cache.put(&fp, position, DIGEST, &format!("{position}: ok")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for position in 0..16 {
            assert_eq!(
                cache.get(&fp, position, DIGEST).await.unwrap(),
                Some(format!("{position}: ok"))
            );
        }
    }

    #[tokio::test]
    async fn test_corrupt_entry_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        let path = cache.path_for(&fp, 0);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        assert!(matches!(
            cache.get(&fp, 0, DIGEST).await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        cache.put(&fp, 0, DIGEST, "a").await.unwrap();
        cache.put(&fp, 1, DIGEST, "b").await.unwrap();

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.get(&fp, 0, DIGEST).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_changed_request_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        cache.put(&fp, 0, "old request", "1: 만족").await.unwrap();
        assert!(cache.exists(&fp, 0));
        assert_eq!(cache.get(&fp, 0, "new request").await.unwrap(), None);

        cache.put(&fp, 0, "new request", "1: 의견").await.unwrap();
        assert_eq!(
            cache.get(&fp, 0, "new request").await.unwrap().as_deref(),
            Some("1: 의견")
        );
        assert_eq!(cache.get(&fp, 0, "old request").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_without_request_digest_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf()).unwrap();
        let fp = fingerprint();

        let path = cache.path_for(&fp, 0);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let legacy = serde_json::json!({
            "fingerprint": fp.as_str(),
            "position": 0,
            "response": "1: 만족",
            "stored_at": 0,
        });
        std::fs::write(&path, legacy.to_string()).unwrap();

        assert_eq!(cache.get(&fp, 0, DIGEST).await.unwrap(), None);
    }
}
