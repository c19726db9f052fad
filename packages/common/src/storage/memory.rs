use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use async_trait::async_trait;
use chrono::Utc;
use sha2::Digest;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::{BlobMeta, BlobStore, BlobUpload, BoxReader};
use super::uid::BlobUid;
use crate::app_ref::AppRef;

/// Process-local blob store for development and tests.
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<BlobUid, (BlobMeta, Vec<u8>)>>,
    max_size: u64,
}

impl MemoryBlobStore {
    pub fn new(max_size: u64) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            max_size,
        }
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(u64::MAX)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<BlobUid, StorageError> {
        let mut data = Vec::new();
        reader
            .take(self.max_size.saturating_add(1))
            .read_to_end(&mut data)
            .await?;
        if data.len() as u64 > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: data.len() as u64,
                limit: self.max_size,
            });
        }

        let mut hasher = BlobUid::hasher(&upload.owner);
        hasher.update(&data);
        let uid = BlobUid::finish(hasher);

        let mut blobs = self.blobs.write().await;
        blobs.entry(uid).or_insert_with(|| {
            let meta = BlobMeta {
                uid,
                owner: upload.owner,
                uploaded_by: upload.uploaded_by,
                created_at: Utc::now(),
                size: data.len() as u64,
            };
            (meta, data)
        });
        Ok(uid)
    }

    async fn get_stream(&self, uid: &BlobUid) -> Result<BoxReader, StorageError> {
        let blobs = self.blobs.read().await;
        let (_, data) = blobs
            .get(uid)
            .ok_or_else(|| StorageError::NotFound(uid.to_hex()))?;
        Ok(Box::new(Cursor::new(data.clone())))
    }

    async fn meta(&self, uid: &BlobUid) -> Result<BlobMeta, StorageError> {
        self.blobs
            .read()
            .await
            .get(uid)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| StorageError::NotFound(uid.to_hex()))
    }

    async fn list(&self, owner: &AppRef) -> Result<Vec<BlobUid>, StorageError> {
        Ok(self
            .blobs
            .read()
            .await
            .values()
            .filter(|(meta, _)| &meta.owner == owner)
            .map(|(meta, _)| meta.uid)
            .collect())
    }

    async fn exists(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        Ok(self.blobs.read().await.contains_key(uid))
    }

    async fn delete(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        Ok(self.blobs.write().await.remove(uid).is_some())
    }
}

/// Wraps a store and fails selected operations, for exercising partial-failure paths.
pub struct FlakyBlobStore<S> {
    inner: S,
    failing_deletes: RwLock<HashMap<BlobUid, String>>,
}

impl<S: BlobStore> FlakyBlobStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing_deletes: RwLock::new(HashMap::new()),
        }
    }

    /// Make every delete of `uid` fail with a backend error.
    pub async fn fail_delete(&self, uid: BlobUid, reason: impl Into<String>) {
        self.failing_deletes.write().await.insert(uid, reason.into());
    }

    pub async fn heal(&self) {
        self.failing_deletes.write().await.clear();
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for FlakyBlobStore<S> {
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<BlobUid, StorageError> {
        self.inner.put_stream(reader, upload).await
    }

    async fn get_stream(&self, uid: &BlobUid) -> Result<BoxReader, StorageError> {
        self.inner.get_stream(uid).await
    }

    async fn meta(&self, uid: &BlobUid) -> Result<BlobMeta, StorageError> {
        self.inner.meta(uid).await
    }

    async fn list(&self, owner: &AppRef) -> Result<Vec<BlobUid>, StorageError> {
        self.inner.list(owner).await
    }

    async fn exists(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        self.inner.exists(uid).await
    }

    async fn delete(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        if let Some(reason) = self.failing_deletes.read().await.get(uid) {
            return Err(StorageError::Backend(reason.clone()));
        }
        self.inner.delete(uid).await
    }
}
