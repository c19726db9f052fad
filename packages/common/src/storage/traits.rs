use std::io::Cursor;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::uid::BlobUid;
use crate::app_ref::AppRef;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Metadata supplied with an upload.
#[derive(Clone, Debug)]
pub struct BlobUpload {
    pub owner: AppRef,
    pub uploaded_by: String,
}

impl BlobUpload {
    pub fn new(owner: AppRef, uploaded_by: impl Into<String>) -> Self {
        Self {
            owner,
            uploaded_by: uploaded_by.into(),
        }
    }
}

/// Metadata persisted next to every blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub uid: BlobUid,
    pub owner: AppRef,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Owner-scoped blob storage.
///
/// UIDs are assigned by the store (see [`BlobUid`]). Re-uploading identical
/// bytes for the same owner returns the existing UID and keeps the original metadata.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the UID.
    async fn put(&self, data: &[u8], upload: BlobUpload) -> Result<BlobUid, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(reader, upload).await
    }

    /// Store data from an async reader and return the UID.
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<BlobUid, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, uid: &BlobUid) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(uid).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, uid: &BlobUid) -> Result<BoxReader, StorageError>;

    /// Read the metadata recorded at upload time.
    async fn meta(&self, uid: &BlobUid) -> Result<BlobMeta, StorageError>;

    /// List the UIDs of every blob owned by `owner`.
    async fn list(&self, owner: &AppRef) -> Result<Vec<BlobUid>, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, uid: &BlobUid) -> Result<bool, StorageError>;

    /// Delete a blob and its metadata.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, uid: &BlobUid) -> Result<bool, StorageError>;
}
