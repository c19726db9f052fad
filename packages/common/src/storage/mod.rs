mod error;
mod traits;
mod uid;

pub mod filesystem;
pub mod memory;
#[cfg(feature = "object-storage")]
pub mod object_store;

pub use error::StorageError;
pub use traits::{BlobMeta, BlobStore, BlobUpload, BoxReader};
pub use uid::BlobUid;
