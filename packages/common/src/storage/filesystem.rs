use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::Digest;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::traits::{BlobMeta, BlobStore, BlobUpload, BoxReader};
use super::uid::BlobUid;
use crate::app_ref::AppRef;

/// Filesystem-backed blob store.
///
/// Layout under `base_path`:
/// - `{2 hex}/{62 hex}`: blob bytes
/// - `{2 hex}/{62 hex}.json`: [`BlobMeta`]
/// - `owners/{namespace}/{name}/{64 hex}`: empty marker, one per owned blob
/// - `.tmp/`: in-flight writes, renamed into place once complete
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        fs::create_dir_all(base_path.join("owners")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn blob_path(&self, uid: &BlobUid) -> PathBuf {
        self.base_path
            .join(uid.shard_prefix())
            .join(uid.shard_suffix())
    }

    fn meta_path(&self, uid: &BlobUid) -> PathBuf {
        self.base_path
            .join(uid.shard_prefix())
            .join(format!("{}.json", uid.shard_suffix()))
    }

    fn owner_dir(&self, owner: &AppRef) -> Result<PathBuf, StorageError> {
        check_owner_component(&owner.namespace)?;
        check_owner_component(&owner.name)?;
        Ok(self
            .base_path
            .join("owners")
            .join(&owner.namespace)
            .join(&owner.name))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Write `data` to `dest` through a temp file so readers never see partial content.
    async fn write_atomic(&self, dest: &Path, data: &[u8]) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::rename(&temp_path, dest).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn record_owner(&self, meta: &BlobMeta) -> Result<(), StorageError> {
        let meta_path = self.meta_path(&meta.uid);
        if !fs::try_exists(&meta_path).await? {
            self.write_atomic(&meta_path, &serde_json::to_vec(meta)?)
                .await?;
        }
        let owner_dir = self.owner_dir(&meta.owner)?;
        fs::create_dir_all(&owner_dir).await?;
        fs::write(owner_dir.join(meta.uid.to_hex()), b"").await?;
        Ok(())
    }
}

fn check_owner_component(part: &str) -> Result<(), StorageError> {
    if part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '\0'])
    {
        return Err(StorageError::InvalidOwner(format!(
            "'{part}' is not a valid path component"
        )));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(
        &self,
        mut reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<BlobUid, StorageError> {
        // Reject bad owners before touching the disk.
        self.owner_dir(&upload.owner)?;

        let temp_path = self.temp_path();
        let mut hasher = BlobUid::hasher(&upload.owner);
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024];
        let mut temp_file = fs::File::create(&temp_path).await?;

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }

            hasher.update(&buf[..n]);
            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        drop(temp_file);

        let uid = BlobUid::finish(hasher);
        let blob_path = self.blob_path(&uid);

        if fs::try_exists(&blob_path).await? {
            let _ = fs::remove_file(&temp_path).await;
        } else {
            if let Some(parent) = blob_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            if let Err(e) = fs::rename(&temp_path, &blob_path).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        }

        let meta = BlobMeta {
            uid,
            owner: upload.owner,
            uploaded_by: upload.uploaded_by,
            created_at: Utc::now(),
            size: total_bytes,
        };
        self.record_owner(&meta).await?;

        tracing::debug!(uid = %uid, owner = %meta.owner, size = total_bytes, "Stored blob");
        Ok(uid)
    }

    async fn get_stream(&self, uid: &BlobUid) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.blob_path(uid)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uid.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn meta(&self, uid: &BlobUid) -> Result<BlobMeta, StorageError> {
        match fs::read(self.meta_path(uid)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uid.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, owner: &AppRef) -> Result<Vec<BlobUid>, StorageError> {
        let dir = self.owner_dir(owner)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut uids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            match name.to_str().map(BlobUid::from_hex) {
                Some(Ok(uid)) => uids.push(uid),
                _ => tracing::warn!(path = ?entry.path(), "Ignoring stray entry in owner index"),
            }
        }
        uids.sort();
        Ok(uids)
    }

    async fn exists(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(uid)).await?)
    }

    async fn delete(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        // The owner index entry is found through the metadata, so it goes first.
        match self.meta(uid).await {
            Ok(meta) => {
                let marker = self.owner_dir(&meta.owner)?.join(uid.to_hex());
                remove_if_present(&marker).await?;
            }
            Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        remove_if_present(&self.meta_path(uid)).await?;
        remove_if_present(&self.blob_path(uid)).await
    }
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
