use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::StorageError;
use crate::app_ref::AppRef;

/// Identifier of a stored blob.
///
/// SHA-256 over the owning application reference followed by the blob bytes,
/// so identical sources uploaded by the same application share one UID while
/// two applications never collide.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobUid([u8; 32]);

impl BlobUid {
    /// Hasher pre-seeded with the owner; feed the blob bytes and call [`BlobUid::finish`].
    pub fn hasher(owner: &AppRef) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(owner.namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(owner.name.as_bytes());
        hasher.update([0u8]);
        hasher
    }

    pub fn finish(hasher: Sha256) -> Self {
        Self(hasher.finalize().into())
    }

    /// Compute the UID of `data` uploaded by `owner`.
    pub fn compute(owner: &AppRef, data: &[u8]) -> Self {
        let mut hasher = Self::hasher(owner);
        hasher.update(data);
        Self::finish(hasher)
    }

    /// Parse a hex-encoded UID string.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != 64 {
            return Err(StorageError::InvalidUid(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }

        let bytes =
            hex::decode(s).map_err(|e| StorageError::InvalidUid(format!("invalid hex: {e}")))?;

        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StorageError::InvalidUid("decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 2 hex characters, used as the shard directory.
    pub fn shard_prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// Remaining 62 hex characters.
    pub fn shard_suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl fmt::Debug for BlobUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobUid({})", self.to_hex())
    }
}

impl fmt::Display for BlobUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for BlobUid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlobUid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
