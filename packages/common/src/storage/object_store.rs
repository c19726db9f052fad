use std::io::Cursor;

use async_trait::async_trait;
use chrono::Utc;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use serde::Deserialize;
use sha2::Digest;
use tokio::io::AsyncReadExt;

use super::error::StorageError;
use super::traits::{BlobMeta, BlobStore, BlobUpload, BoxReader};
use super::uid::BlobUid;
use crate::app_ref::AppRef;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, SeaweedFS, ...). AWS is used when absent.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".into()
}

fn default_path_style() -> bool {
    true
}

/// Blob store on an S3-compatible bucket.
///
/// Keys: `blobs/{hex}`, `meta/{hex}.json` and `owners/{namespace}/{name}/{hex}`.
/// Objects are buffered in memory up to `max_size` before upload.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

impl S3BlobStore {
    pub fn new(config: &S3Config, max_size: u64) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(backend)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }
        Ok(Self { bucket, max_size })
    }

    fn blob_key(uid: &BlobUid) -> String {
        format!("blobs/{}", uid.to_hex())
    }

    fn meta_key(uid: &BlobUid) -> String {
        format!("meta/{}.json", uid.to_hex())
    }

    fn owner_prefix(owner: &AppRef) -> Result<String, StorageError> {
        for part in [&owner.namespace, &owner.name] {
            if part.is_empty() || part.contains('/') {
                return Err(StorageError::InvalidOwner(format!(
                    "'{part}' is not a valid key component"
                )));
            }
        }
        Ok(format!("owners/{}/{}/", owner.namespace, owner.name))
    }

    /// GET an object, mapping a 404 to `None`.
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.bucket.get_object(key).await {
            Ok(resp) if resp.status_code() == 404 => Ok(None),
            Ok(resp) if resp.status_code() >= 300 => Err(StorageError::Backend(format!(
                "GET {key} returned {}",
                resp.status_code()
            ))),
            Ok(resp) => Ok(Some(resp.bytes().to_vec())),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(backend(e)),
        }
    }

    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let resp = self.bucket.put_object(key, data).await.map_err(backend)?;
        if resp.status_code() >= 300 {
            return Err(StorageError::Backend(format!(
                "PUT {key} returned {}",
                resp.status_code()
            )));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.bucket.delete_object(key).await {
            Ok(resp) if resp.status_code() >= 300 && resp.status_code() != 404 => {
                Err(StorageError::Backend(format!(
                    "DELETE {key} returned {}",
                    resp.status_code()
                )))
            }
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(backend(e)),
        }
    }
}

fn backend(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_stream(
        &self,
        reader: BoxReader,
        upload: BlobUpload,
    ) -> Result<BlobUid, StorageError> {
        let prefix = Self::owner_prefix(&upload.owner)?;

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

        if self.fetch(&Self::meta_key(&uid)).await?.is_none() {
            self.store(&Self::blob_key(&uid), &data).await?;
            let meta = BlobMeta {
                uid,
                owner: upload.owner,
                uploaded_by: upload.uploaded_by,
                created_at: Utc::now(),
                size: data.len() as u64,
            };
            self.store(&Self::meta_key(&uid), &serde_json::to_vec(&meta)?)
                .await?;
        }
        self.store(&format!("{prefix}{}", uid.to_hex()), b"").await?;

        tracing::debug!(uid = %uid, bucket = %self.bucket.name(), "Stored blob");
        Ok(uid)
    }

    async fn get_stream(&self, uid: &BlobUid) -> Result<BoxReader, StorageError> {
        let data = self
            .fetch(&Self::blob_key(uid))
            .await?
            .ok_or_else(|| StorageError::NotFound(uid.to_hex()))?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn meta(&self, uid: &BlobUid) -> Result<BlobMeta, StorageError> {
        let raw = self
            .fetch(&Self::meta_key(uid))
            .await?
            .ok_or_else(|| StorageError::NotFound(uid.to_hex()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn list(&self, owner: &AppRef) -> Result<Vec<BlobUid>, StorageError> {
        let prefix = Self::owner_prefix(owner)?;
        let pages = self
            .bucket
            .list(prefix.clone(), None)
            .await
            .map_err(backend)?;

        let mut uids = Vec::new();
        for object in pages.iter().flat_map(|page| page.contents.iter()) {
            let name = object.key.trim_start_matches(prefix.as_str());
            match BlobUid::from_hex(name) {
                Ok(uid) => uids.push(uid),
                Err(_) => tracing::warn!(key = %object.key, "Ignoring stray key in owner index"),
            }
        }
        uids.sort();
        Ok(uids)
    }

    async fn exists(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        Ok(self.fetch(&Self::meta_key(uid)).await?.is_some())
    }

    async fn delete(&self, uid: &BlobUid) -> Result<bool, StorageError> {
        let meta = match self.meta(uid).await {
            Ok(meta) => meta,
            Err(StorageError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let prefix = Self::owner_prefix(&meta.owner)?;
        self.remove(&format!("{prefix}{}", uid.to_hex())).await?;
        self.remove(&Self::blob_key(uid)).await?;
        self.remove(&Self::meta_key(uid)).await?;
        Ok(true)
    }
}
