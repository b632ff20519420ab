use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{tmp_path, try_write_atomic};
use crate::config::PostStatus;
use crate::error::RecordStoreError;

/// A post that has not been stored yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub author_id: u64,
    pub category_id: u64,
    pub status: PostStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub author_id: u64,
    pub category_id: u64,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
}

impl Record {
    fn from_draft(id: u64, draft: PostDraft) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            author_id: draft.author_id,
            category_id: draft.category_id,
            status: draft.status,
            created_at: Utc::now(),
        }
    }
}

/// Where created posts end up.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record whose title is exactly `title`, whatever its status.
    async fn find_by_title(&self, title: &str) -> Result<Vec<Record>, RecordStoreError>;

    /// Stores `draft`. Implementations reject a title that is already taken
    /// with [`RecordStoreError::DuplicateTitle`].
    async fn insert(&self, draft: PostDraft) -> Result<Record, RecordStoreError>;

    async fn list(&self) -> Result<Vec<Record>, RecordStoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PostData {
    next_id: u64,
    records: Vec<Record>,
}

/// Record store kept in memory and optionally mirrored to a JSON file.
#[derive(Debug, Clone)]
pub struct PostStore {
    inner: Arc<RwLock<PostData>>,
    path: Option<PathBuf>,
}

impl PostStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PostData::default())),
            path: None,
        }
    }

    /// Opens a JSON-backed store. A missing file is an empty store. A corrupt
    /// file is replaced by its `.tmp` sibling, or is an error when that is
    /// unusable too; it never silently becomes an empty store.
    pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, RecordStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<PostData>(&bytes) {
                Ok(data) => data,
                Err(source) => {
                    warn!(error = %source, path = %path.display(), "failed to parse post store, trying tmp fallback");
                    match read_tmp(&path).await {
                        Some(data) => data,
                        None => return Err(RecordStoreError::Corrupt { path, source }),
                    }
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PostData::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
            path: Some(path),
        })
    }
}

async fn read_tmp(path: &Path) -> Option<PostData> {
    let bytes = tokio::fs::read(tmp_path(path)).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[async_trait]
impl RecordStore for PostStore {
    async fn find_by_title(&self, title: &str) -> Result<Vec<Record>, RecordStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|record| record.title == title)
            .cloned()
            .collect())
    }

    async fn insert(&self, draft: PostDraft) -> Result<Record, RecordStoreError> {
        let mut inner = self.inner.write().await;
        if inner.records.iter().any(|record| record.title == draft.title) {
            return Err(RecordStoreError::DuplicateTitle(draft.title));
        }

        let id = inner.next_id + 1;
        let record = Record::from_draft(id, draft);

        // Only commit to memory once the file write went through.
        if let Some(path) = &self.path {
            let mut staged = (*inner).clone();
            staged.next_id = id;
            staged.records.push(record.clone());
            let bytes = serde_json::to_vec_pretty(&staged)?;
            try_write_atomic(path, &bytes).await?;
            *inner = staged;
        } else {
            debug!("post store is in-memory only; skipping persist");
            inner.next_id = id;
            inner.records.push(record.clone());
        }
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<Record>, RecordStoreError> {
        Ok(self.inner.read().await.records.clone())
    }
}
