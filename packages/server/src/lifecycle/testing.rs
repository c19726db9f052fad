//! In-memory fixture for lifecycle tests.

use std::sync::Arc;
use std::time::Duration;

use common::storage::memory::{FlakyBlobStore, MemoryBlobStore};
use common::storage::{BlobStore, BlobUid, BlobUpload};
use common::{AppRef, BuildOutcome, BuildReport};

use super::{ApplicationSpec, DeployRequest, Gateways, Lifecycle, StagingSettings};
use crate::backend::memory::{
    InMemoryApplicationRepository, InMemoryBuildPipeline, InMemoryDependentRepository,
    InMemoryWorkloadRuntime,
};
use crate::domain::{
    Application, ApplicationPatch, BuildPipeline, BuildRun, DependentKey, DependentKind,
    Workload, WorkloadRuntime,
};

pub const NAMESPACE: &str = "workspace";

/// Smallest byte string sniffed as a gzip archive.
pub const GZIP_ARCHIVE: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];

pub struct Harness {
    pub lifecycle: Lifecycle,
    pub blobs: Arc<FlakyBlobStore<MemoryBlobStore>>,
    pub builds: Arc<InMemoryBuildPipeline>,
    pub workloads: Arc<InMemoryWorkloadRuntime>,
}

impl Harness {
    pub fn new() -> Self {
        let blobs = Arc::new(FlakyBlobStore::new(MemoryBlobStore::default()));
        let builds = Arc::new(InMemoryBuildPipeline::new());
        let workloads = Arc::new(InMemoryWorkloadRuntime::new());
        let gateways = Gateways {
            apps: Arc::new(InMemoryApplicationRepository::new()),
            builds: builds.clone(),
            workloads: workloads.clone(),
            dependents: Arc::new(InMemoryDependentRepository::new()),
            blobs: blobs.clone(),
        };
        let settings = StagingSettings {
            default_builder_image: "builder/default:1".into(),
            registry_url: "registry.test/apps".into(),
            poll_interval: Duration::from_millis(5),
            max_poll_interval: Duration::from_millis(20),
        };
        Self {
            lifecycle: Lifecycle::new(gateways, settings),
            blobs,
            builds,
            workloads,
        }
    }

    pub fn default_builder(&self) -> &str {
        "builder/default:1"
    }

    pub async fn app(&self, name: &str) -> AppRef {
        let app = AppRef::new(NAMESPACE, name);
        self.lifecycle
            .create_application(&app, "alice", ApplicationSpec::default())
            .await
            .unwrap();
        app
    }

    /// Store raw bytes for `app`, skipping archive sniffing.
    pub async fn upload(&self, app: &AppRef, data: &[u8]) -> BlobUid {
        self.blobs
            .put(data, BlobUpload::new(app.clone(), "alice"))
            .await
            .unwrap()
    }

    pub async fn stage(&self, app: &AppRef, uid: &BlobUid) -> BuildRun {
        self.lifecycle.stage(app, uid, None, "alice").await.unwrap()
    }

    pub async fn complete(&self, run_id: &str, outcome: BuildOutcome) -> BuildRun {
        self.builds
            .complete(&BuildReport::new(run_id, outcome))
            .await
            .unwrap()
    }

    pub async fn succeeded_run(&self, app: &AppRef, data: &[u8]) -> BuildRun {
        let uid = self.upload(app, data).await;
        let run = self.stage(app, &uid).await;
        self.complete(&run.run_id, BuildOutcome::Succeeded).await
    }

    /// Create, build and deploy `name`.
    pub async fn deployed_app(&self, name: &str) -> AppRef {
        let app = self.app(name).await;
        let run = self.succeeded_run(&app, name.as_bytes()).await;
        self.lifecycle
            .deploy(
                &app,
                DeployRequest {
                    stage_id: run.run_id,
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        app
    }

    async fn dependent(
        &self,
        kind: DependentKind,
        name: &str,
        pairs: &[(&str, &str)],
    ) -> DependentKey {
        let key = DependentKey::new(kind, NAMESPACE, name);
        let data = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.lifecycle
            .create_dependent(key.clone(), None, data, "alice")
            .await
            .unwrap();
        key
    }

    pub async fn configuration(&self, name: &str, pairs: &[(&str, &str)]) -> DependentKey {
        self.dependent(DependentKind::Configuration, name, pairs).await
    }

    pub async fn service(&self, name: &str, pairs: &[(&str, &str)]) -> DependentKey {
        self.dependent(DependentKind::Service, name, pairs).await
    }

    pub async fn update_app_routes(&self, app: &AppRef, routes: &[&str]) {
        let patch = ApplicationPatch {
            routes: Some(routes.iter().map(|r| r.to_string()).collect()),
            ..Default::default()
        };
        self.lifecycle.update_application(app, patch).await.unwrap();
    }

    pub async fn set_app_builder(&self, app: &AppRef, image: &str) {
        let patch = ApplicationPatch {
            builder_image: Some(image.to_string()),
            ..Default::default()
        };
        self.lifecycle.update_application(app, patch).await.unwrap();
    }

    pub async fn application(&self, app: &AppRef) -> Application {
        self.lifecycle.show_application(app).await.unwrap().application
    }

    pub async fn workload(&self, app: &AppRef) -> Option<Workload> {
        self.workloads.get(app).await.unwrap()
    }

    pub async fn runs(&self, app: &AppRef) -> Vec<BuildRun> {
        self.builds.list(app).await.unwrap()
    }

    pub async fn blob_exists(&self, uid: &BlobUid) -> bool {
        self.blobs.exists(uid).await.unwrap()
    }

    pub async fn blob_count(&self, app: &AppRef) -> usize {
        self.blobs.list(app).await.unwrap().len()
    }
}
