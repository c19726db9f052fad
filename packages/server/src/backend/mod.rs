//! Gateway implementations and their selection from configuration.

pub mod dispatch;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Context;
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::memory::MemoryBlobStore;
use common::storage::object_store::S3BlobStore;
use mq::Mq;
use tracing::info;

use crate::config::{AppConfig, BackendKind, StorageBackend};
use crate::database::init_db;
use crate::domain::BuildPipeline;
use crate::lifecycle::Gateways;

pub use dispatch::QueuedBuildPipeline;

/// Build the blob store named by `storage.backend`.
pub async fn init_blob_store(config: &AppConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    let storage = &config.storage;
    let store: Arc<dyn BlobStore> = match storage.backend {
        StorageBackend::Memory => Arc::new(MemoryBlobStore::new(storage.max_blob_size)),
        StorageBackend::Filesystem => Arc::new(
            FilesystemBlobStore::new(storage.path.clone(), storage.max_blob_size)
                .await
                .with_context(|| format!("opening blob store at {}", storage.path.display()))?,
        ),
        StorageBackend::S3 => {
            let s3 = storage
                .s3
                .as_ref()
                .context("storage.backend = \"s3\" requires a [storage.s3] section")?;
            Arc::new(S3BlobStore::new(s3, storage.max_blob_size)?)
        }
    };
    info!(backend = ?storage.backend, "Blob store ready");
    Ok(store)
}

/// Build every gateway the lifecycle needs.
///
/// When `mq` is given, build runs are additionally published to the job queue.
pub async fn init_gateways(config: &AppConfig, mq: Option<Arc<Mq>>) -> anyhow::Result<Gateways> {
    let blobs = init_blob_store(config).await?;

    let mut gateways = match config.backend {
        BackendKind::Memory => Gateways {
            apps: Arc::new(memory::InMemoryApplicationRepository::new()),
            builds: Arc::new(memory::InMemoryBuildPipeline::new()),
            workloads: Arc::new(memory::InMemoryWorkloadRuntime::new()),
            dependents: Arc::new(memory::InMemoryDependentRepository::new()),
            blobs,
        },
        BackendKind::Postgres => {
            let db = init_db(&config.database)
                .await
                .context("connecting to database")?;
            Gateways {
                apps: Arc::new(postgres::PostgresApplicationRepository::new(db.clone())),
                builds: Arc::new(postgres::PostgresBuildPipeline::new(db.clone())),
                workloads: Arc::new(postgres::PostgresWorkloadRuntime::new(db.clone())),
                dependents: Arc::new(postgres::PostgresDependentRepository::new(db)),
                blobs,
            }
        }
    };
    info!(backend = ?config.backend, "Gateways ready");

    if let Some(mq) = mq {
        let queued: Arc<dyn BuildPipeline> = Arc::new(QueuedBuildPipeline::new(
            gateways.builds.clone(),
            mq,
            config.mq.job_queue.clone(),
        ));
        gateways.builds = queued;
    }
    Ok(gateways)
}
