use std::collections::BTreeMap;

use async_trait::async_trait;
use common::storage::BlobUid;
use common::{AppRef, BuildReport};
use thiserror::Error;

use super::application::{Application, ApplicationPatch};
use super::build::BuildRun;
use super::dependent::{BindOutcome, Binding, DeleteOutcome, Dependent, DependentKey, DependentKind};
use super::workload::{DeployRecord, Workload};

/// Failure reported by a gateway backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{kind} '{name}' does not exist")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    Conflict { kind: &'static str, name: String },

    /// The backend could not be reached. Retryable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with data that does not decode.
    #[error("malformed backend data: {0}")]
    Malformed(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl GatewayError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn conflict(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
        }
    }
}

impl From<sea_orm::DbErr> for GatewayError {
    fn from(err: sea_orm::DbErr) -> Self {
        use sea_orm::DbErr;
        match err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::Unavailable(err.to_string()),
            DbErr::Json(_) | DbErr::Type(_) | DbErr::TryIntoErr { .. } => {
                Self::Malformed(err.to_string())
            }
            DbErr::RecordNotFound(name) => Self::NotFound {
                kind: "record",
                name,
            },
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Application resources and the current-blob pointer.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the application exists.
    async fn create(&self, app: &Application) -> Result<(), GatewayError>;

    async fn find(&self, app: &AppRef) -> Result<Option<Application>, GatewayError>;

    async fn list(&self, namespace: &str) -> Result<Vec<Application>, GatewayError>;

    /// Apply `patch` atomically and return the updated resource.
    async fn update(
        &self,
        app: &AppRef,
        patch: &ApplicationPatch,
    ) -> Result<Application, GatewayError>;

    /// Last-writer-wins pointer write.
    async fn set_current_blob(&self, app: &AppRef, uid: &BlobUid) -> Result<(), GatewayError>;

    /// Returns `false` when the application did not exist.
    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError>;
}

/// The build engine as seen by the control plane.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Record and start a pending run.
    async fn submit(&self, run: &BuildRun) -> Result<(), GatewayError>;

    /// Every run of `app`, oldest first.
    async fn list(&self, app: &AppRef) -> Result<Vec<BuildRun>, GatewayError>;

    async fn get(&self, run_id: &str) -> Result<Option<BuildRun>, GatewayError>;

    /// Intake a completion report. A run that already finished is returned unchanged.
    async fn complete(&self, report: &BuildReport) -> Result<BuildRun, GatewayError>;

    /// Drop every run of `app`.
    async fn forget(&self, app: &AppRef) -> Result<(), GatewayError>;
}

/// Materializes deploy records as running workloads.
#[async_trait]
pub trait WorkloadRuntime: Send + Sync {
    /// Declarative and idempotent: an identical record leaves the workload untouched.
    async fn apply(&self, record: &DeployRecord) -> Result<Workload, GatewayError>;

    async fn get(&self, app: &AppRef) -> Result<Option<Workload>, GatewayError>;

    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError>;
}

/// Configurations, services and their bindings to applications.
///
/// `bind` and `delete_unbound` are atomic with respect to each other: a bind never
/// lands on a dependent that a concurrent delete removed.
#[async_trait]
pub trait DependentRepository: Send + Sync {
    /// Fails with `Conflict` when the dependent exists.
    async fn create(&self, dependent: &Dependent) -> Result<(), GatewayError>;

    async fn find(&self, key: &DependentKey) -> Result<Option<Dependent>, GatewayError>;

    async fn list(
        &self,
        kind: DependentKind,
        namespace: &str,
    ) -> Result<Vec<Dependent>, GatewayError>;

    async fn update_data(
        &self,
        key: &DependentKey,
        data: &BTreeMap<String, String>,
    ) -> Result<Dependent, GatewayError>;

    /// Compare-and-delete: removes the dependent only when nothing is bound to it.
    async fn delete_unbound(&self, key: &DependentKey) -> Result<DeleteOutcome, GatewayError>;

    /// Compare-and-insert: creates the binding only when the dependent exists and
    /// the binding does not.
    async fn bind(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<BindOutcome, GatewayError>;

    /// Returns `false` when no binding existed.
    async fn unbind(&self, app: &AppRef, key: &DependentKey) -> Result<bool, GatewayError>;

    async fn bindings_of_app(&self, app: &AppRef) -> Result<Vec<Binding>, GatewayError>;

    async fn bindings_of(&self, key: &DependentKey) -> Result<Vec<Binding>, GatewayError>;

    async fn set_fingerprint(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<(), GatewayError>;
}
