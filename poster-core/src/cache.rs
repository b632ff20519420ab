use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "rssposter_";

/// Cache key for a feed: lowercased, spaces turned into underscores, prefixed.
pub fn cache_key(feed_name: &str) -> String {
    format!("{KEY_PREFIX}{}", feed_name.to_lowercase().replace(' ', "_"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub raw_content: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheData {
    entries: HashMap<String, CacheEntry>,
}

/// Key-value store whose entries expire. Stale entries are never served.
#[derive(Debug, Clone)]
pub struct FeedCache {
    inner: Arc<RwLock<CacheData>>,
    path: Option<PathBuf>,
}

impl FeedCache {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(CacheData::default())),
            path: None,
        }
    }

    /// Opens a JSON-backed cache. A corrupt file falls back to its `.tmp`
    /// sibling, then to an empty cache.
    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data: CacheData = read_json_with_tmp_fallback(&path).await;
        Self {
            inner: Arc::new(RwLock::new(data)),
            path: Some(path),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;
        if entry.is_fresh_at(Utc::now()) {
            Some(entry.raw_content.clone())
        } else {
            debug!(key, expired_at = %entry.expires_at, "cache entry is stale");
            None
        }
    }

    pub async fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.read().await.entries.get(key).cloned()
    }

    /// Replaces whatever is stored under `key`. Last writer wins.
    pub async fn put(&self, key: &str, raw_content: String, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CacheEntry {
            key: key.to_owned(),
            raw_content,
            expires_at,
        };
        self.inner
            .write()
            .await
            .entries
            .insert(key.to_owned(), entry);
        self.persist().await;
    }

    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.inner.write().await.entries.remove(key).is_some();
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Drops stale entries and returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.is_fresh_at(now));
        let purged = before - inner.entries.len();
        drop(inner);
        if purged > 0 {
            self.persist().await;
        }
        purged
    }

    async fn persist(&self) {
        let Some(path) = &self.path else {
            debug!("feed cache is in-memory only; skipping persist");
            return;
        };
        let inner = self.inner.read().await;
        match serde_json::to_vec_pretty(&*inner) {
            Ok(bytes) => write_atomic(path, &bytes).await,
            Err(e) => warn!(error = %e, "failed to serialize feed cache"),
        }
    }
}

pub(crate) async fn read_json_with_tmp_fallback<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
                match tokio::fs::read(tmp_path(path)).await {
                    Ok(tmp_bytes) => serde_json::from_slice::<T>(&tmp_bytes).unwrap_or_default(),
                    Err(_) => Default::default(),
                }
            }
        },
        Err(_) => Default::default(),
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) {
    if let Err(e) = try_write_atomic(path, bytes).await {
        warn!(error = %e, path = %path.display(), "failed to persist file");
    }
}

pub(crate) async fn try_write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_lowercased_and_underscored() {
        assert_eq!(cache_key("Top Stories"), "rssposter_top_stories");
        assert_eq!(cache_key("Top Stories"), cache_key("Top Stories"));
        assert_eq!(cache_key("TOP stories"), cache_key("top Stories"));
        assert_ne!(cache_key("top stories"), cache_key("top_stories "));
        assert_ne!(cache_key("world"), cache_key("sports"));
        assert_eq!(cache_key(""), "rssposter_");
    }

    #[tokio::test]
    async fn fresh_entry_is_served() {
        let cache = FeedCache::in_memory();
        cache
            .put("k", "<rss/>".into(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("<rss/>"));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_but_kept_until_purged() {
        let cache = FeedCache::in_memory();
        cache.put("k", "<rss/>".into(), Duration::ZERO).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.entry("k").await.is_some());
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.entry("k").await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let cache = FeedCache::in_memory();
        cache.put("k", "old".into(), Duration::ZERO).await;
        cache.put("k", "new".into(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("new"));
        assert!(cache.remove("k").await);
        assert!(!cache.remove("k").await);
    }
}
