//! Build/deploy lifecycle core.
//!
//! Every operation is a method on [`Lifecycle`], grouped by concern:
//! `staging` (submit and await build runs), `blobs` (current pointer and reclaim),
//! `deploy` (apply workloads), `binding` (configurations and services),
//! `deletion` (batch application removal) and `application` (resource CRUD and upload).
//! `workload` holds the record-building primitive they all share.

pub mod application;
pub mod binding;
pub mod blobs;
pub mod deletion;
pub mod deploy;
pub mod staging;
pub mod workload;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use common::storage::{BlobStore, StorageError};
use common::{AppRef, BuildOutcome};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::StagingConfig;
use crate::domain::{
    Application, ApplicationRepository, BuildPipeline, DependentKey, DependentRepository,
    GatewayError, WorkloadRuntime,
};

pub use application::{ApplicationDetails, ApplicationSpec};
pub use binding::DependentUpdate;
pub use blobs::{ReclaimFailure, ReclaimReport};
pub use deletion::DeletionReport;
pub use deploy::{DeployOutcome, DeployRequest};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    Conflict { kind: &'static str, name: String },

    #[error("blob app mismatch")]
    BlobAppMismatch { expected: String, found: String },

    #[error("stage app mismatch")]
    StageAppMismatch { expected: String, found: String },

    #[error("stage '{stage_id}' has not succeeded (outcome: {outcome})")]
    StageNotSucceeded {
        stage_id: String,
        outcome: BuildOutcome,
    },

    #[error("bound applications exist")]
    BoundApplicationsExist { apps: Vec<String> },

    #[error("{0}")]
    Validation(String),

    #[error("application '{0}' is not deployed")]
    NotDeployed(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("timed out waiting for stage '{0}'")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{} errors", .0.len())]
    Multiple(Vec<LifecycleError>),
}

impl LifecycleError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Supplementary text shown next to the error title.
    pub fn details(&self) -> String {
        match self {
            Self::BlobAppMismatch { expected, found }
            | Self::StageAppMismatch { expected, found } => {
                format!("expected: {expected}, found: {found}")
            }
            Self::BoundApplicationsExist { apps } => apps.join(","),
            _ => String::new(),
        }
    }

    /// Collapse collected per-item errors: none is `Ok`, one is itself.
    pub fn collect(mut errors: Vec<LifecycleError>) -> Result<(), LifecycleError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// Mismatch details between the application a request names and the one a
    /// resource belongs to. Names are compared first, then namespaces.
    fn mismatch(expected: &AppRef, found: &AppRef) -> Option<(String, String)> {
        if expected.name != found.name {
            Some((expected.name.clone(), found.name.clone()))
        } else if expected.namespace != found.namespace {
            Some((expected.namespace.clone(), found.namespace.clone()))
        } else {
            None
        }
    }
}

impl From<GatewayError> for LifecycleError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { kind, name } => Self::NotFound { kind, name },
            GatewayError::Conflict { kind, name } => Self::Conflict { kind, name },
            GatewayError::Unavailable(msg) => Self::UpstreamUnavailable(msg),
            GatewayError::Malformed(msg) | GatewayError::Backend(msg) => Self::Internal(msg),
        }
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(uid) => Self::not_found("blob", uid),
            StorageError::Backend(msg) => Self::UpstreamUnavailable(msg),
            StorageError::SizeLimitExceeded { .. }
            | StorageError::InvalidUid(_)
            | StorageError::InvalidOwner(_) => Self::Validation(err.to_string()),
            StorageError::Io(_) | StorageError::Metadata(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Lower bound for the completion poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Staging knobs resolved from [`StagingConfig`].
#[derive(Clone, Debug)]
pub struct StagingSettings {
    pub default_builder_image: String,
    pub registry_url: String,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
}

impl From<&StagingConfig> for StagingSettings {
    fn from(config: &StagingConfig) -> Self {
        let poll_interval = Duration::from_millis(config.poll_interval_ms).max(MIN_POLL_INTERVAL);
        Self {
            default_builder_image: config.default_builder_image.clone(),
            registry_url: config.registry_url.clone(),
            poll_interval,
            max_poll_interval: Duration::from_millis(config.max_poll_interval_ms)
                .max(poll_interval),
        }
    }
}

/// The gateways the lifecycle drives.
#[derive(Clone)]
pub struct Gateways {
    pub apps: Arc<dyn ApplicationRepository>,
    pub builds: Arc<dyn BuildPipeline>,
    pub workloads: Arc<dyn WorkloadRuntime>,
    pub dependents: Arc<dyn DependentRepository>,
    pub blobs: Arc<dyn BlobStore>,
}

type LockMap = DashMap<DependentKey, Arc<Mutex<()>>>;

/// Held while a dependent is being bound, unbound, updated or deleted.
///
/// On release the map entry is dropped unless another task still holds or
/// waits on the same mutex, so the map only carries keys that are in use.
pub(crate) struct DependentGuard {
    key: DependentKey,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DependentGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct Lifecycle {
    apps: Arc<dyn ApplicationRepository>,
    builds: Arc<dyn BuildPipeline>,
    workloads: Arc<dyn WorkloadRuntime>,
    dependents: Arc<dyn DependentRepository>,
    blobs: Arc<dyn BlobStore>,
    settings: StagingSettings,
    /// Serializes bind, unbind, update and delete per dependent.
    locks: Arc<LockMap>,
}

impl Lifecycle {
    pub fn new(gateways: Gateways, settings: StagingSettings) -> Self {
        Self {
            apps: gateways.apps,
            builds: gateways.builds,
            workloads: gateways.workloads,
            dependents: gateways.dependents,
            blobs: gateways.blobs,
            settings,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Build pipeline gateway, for report intake.
    pub fn builds(&self) -> &Arc<dyn BuildPipeline> {
        &self.builds
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    async fn require_app(&self, app: &AppRef) -> Result<Application, LifecycleError> {
        self.apps
            .find(app)
            .await?
            .ok_or_else(|| LifecycleError::not_found("application", app.name.clone()))
    }

    async fn lock_dependent(&self, key: &DependentKey) -> DependentGuard {
        let lock = self.locks.entry(key.clone()).or_default().clone();
        DependentGuard {
            key: key.clone(),
            locks: self.locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }
}
