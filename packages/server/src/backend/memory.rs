//! Process-local gateways for development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::storage::BlobUid;
use common::{AppRef, BuildReport};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use crate::domain::{
    Application, ApplicationPatch, ApplicationRepository, BindOutcome, Binding, BuildPipeline,
    BuildRun, DeleteOutcome, Dependent, DependentKey, DependentKind, DependentRepository,
    DeployRecord, GatewayError, Workload, WorkloadRuntime,
};

#[derive(Default)]
pub struct InMemoryApplicationRepository {
    apps: DashMap<AppRef, Application>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn create(&self, app: &Application) -> Result<(), GatewayError> {
        match self.apps.entry(app.app.clone()) {
            Entry::Occupied(_) => {
                Err(GatewayError::conflict("application", app.app.name.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(app.clone());
                Ok(())
            }
        }
    }

    async fn find(&self, app: &AppRef) -> Result<Option<Application>, GatewayError> {
        Ok(self.apps.get(app).map(|a| a.clone()))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Application>, GatewayError> {
        let mut apps: Vec<Application> = self
            .apps
            .iter()
            .filter(|a| a.key().namespace == namespace)
            .map(|a| a.value().clone())
            .collect();
        apps.sort_by(|a, b| a.app.cmp(&b.app));
        Ok(apps)
    }

    async fn update(
        &self,
        app: &AppRef,
        patch: &ApplicationPatch,
    ) -> Result<Application, GatewayError> {
        let mut entry = self
            .apps
            .get_mut(app)
            .ok_or_else(|| GatewayError::not_found("application", app.name.clone()))?;
        entry.apply(patch);
        Ok(entry.clone())
    }

    async fn set_current_blob(&self, app: &AppRef, uid: &BlobUid) -> Result<(), GatewayError> {
        let mut entry = self
            .apps
            .get_mut(app)
            .ok_or_else(|| GatewayError::not_found("application", app.name.clone()))?;
        entry.current_blob = Some(*uid);
        Ok(())
    }

    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError> {
        Ok(self.apps.remove(app).is_some())
    }
}

/// Build runs kept in memory. Runs stay pending until a report arrives.
#[derive(Default)]
pub struct InMemoryBuildPipeline {
    runs: DashMap<String, BuildRun>,
}

impl InMemoryBuildPipeline {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildPipeline for InMemoryBuildPipeline {
    async fn submit(&self, run: &BuildRun) -> Result<(), GatewayError> {
        match self.runs.entry(run.run_id.clone()) {
            Entry::Occupied(_) => Err(GatewayError::conflict("stage", run.run_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(run.clone());
                Ok(())
            }
        }
    }

    async fn list(&self, app: &AppRef) -> Result<Vec<BuildRun>, GatewayError> {
        let mut runs: Vec<BuildRun> = self
            .runs
            .iter()
            .filter(|r| &r.app == app)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    async fn get(&self, run_id: &str) -> Result<Option<BuildRun>, GatewayError> {
        Ok(self.runs.get(run_id).map(|r| r.clone()))
    }

    async fn complete(&self, report: &BuildReport) -> Result<BuildRun, GatewayError> {
        let mut run = self
            .runs
            .get_mut(&report.run_id)
            .ok_or_else(|| GatewayError::not_found("stage", report.run_id.clone()))?;
        if run.is_pending() && report.outcome.is_final() {
            run.outcome = report.outcome;
            run.completed_at = Some(report.completed_at);
            run.message = report.message.clone();
        }
        Ok(run.clone())
    }

    async fn forget(&self, app: &AppRef) -> Result<(), GatewayError> {
        self.runs.retain(|_, run| &run.app != app);
        Ok(())
    }
}

/// Workloads kept in memory. Can be switched offline to exercise upstream failures.
#[derive(Default)]
pub struct InMemoryWorkloadRuntime {
    workloads: DashMap<AppRef, Workload>,
    offline: AtomicBool,
}

impl InMemoryWorkloadRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `GatewayError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("workload runtime offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkloadRuntime for InMemoryWorkloadRuntime {
    async fn apply(&self, record: &DeployRecord) -> Result<Workload, GatewayError> {
        self.check_online()?;
        let mut entry = self
            .workloads
            .entry(record.app.clone())
            .or_insert_with(|| Workload::next(None, record));
        let next = Workload::next(Some(&*entry), record);
        *entry = next.clone();
        Ok(next)
    }

    async fn get(&self, app: &AppRef) -> Result<Option<Workload>, GatewayError> {
        self.check_online()?;
        Ok(self.workloads.get(app).map(|w| w.clone()))
    }

    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError> {
        self.check_online()?;
        Ok(self.workloads.remove(app).is_some())
    }
}

#[derive(Default)]
struct DependentTables {
    dependents: BTreeMap<DependentKey, Dependent>,
    /// Bindings per dependent, keyed by application.
    bindings: HashMap<DependentKey, BTreeMap<AppRef, Binding>>,
}

/// Dependents and bindings behind one lock, so bind and delete are atomic
/// with respect to each other.
#[derive(Default)]
pub struct InMemoryDependentRepository {
    tables: Mutex<DependentTables>,
}

impl InMemoryDependentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DependentRepository for InMemoryDependentRepository {
    async fn create(&self, dependent: &Dependent) -> Result<(), GatewayError> {
        let mut tables = self.tables.lock().await;
        if tables.dependents.contains_key(&dependent.key) {
            return Err(GatewayError::conflict(
                dependent.key.kind.as_str(),
                dependent.key.name.clone(),
            ));
        }
        tables
            .dependents
            .insert(dependent.key.clone(), dependent.clone());
        Ok(())
    }

    async fn find(&self, key: &DependentKey) -> Result<Option<Dependent>, GatewayError> {
        Ok(self.tables.lock().await.dependents.get(key).cloned())
    }

    async fn list(
        &self,
        kind: DependentKind,
        namespace: &str,
    ) -> Result<Vec<Dependent>, GatewayError> {
        Ok(self
            .tables
            .lock()
            .await
            .dependents
            .values()
            .filter(|d| d.key.kind == kind && d.key.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn update_data(
        &self,
        key: &DependentKey,
        data: &BTreeMap<String, String>,
    ) -> Result<Dependent, GatewayError> {
        let mut tables = self.tables.lock().await;
        let dependent = tables
            .dependents
            .get_mut(key)
            .ok_or_else(|| GatewayError::not_found(key.kind.as_str(), key.name.clone()))?;
        dependent.data = data.clone();
        Ok(dependent.clone())
    }

    async fn delete_unbound(&self, key: &DependentKey) -> Result<DeleteOutcome, GatewayError> {
        let mut tables = self.tables.lock().await;
        if !tables.dependents.contains_key(key) {
            return Ok(DeleteOutcome::Missing);
        }
        if let Some(bound) = tables.bindings.get(key).filter(|b| !b.is_empty()) {
            return Ok(DeleteOutcome::Bound(
                bound.keys().map(|app| app.name.clone()).collect(),
            ));
        }
        tables.dependents.remove(key);
        tables.bindings.remove(key);
        Ok(DeleteOutcome::Deleted)
    }

    async fn bind(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<BindOutcome, GatewayError> {
        let mut tables = self.tables.lock().await;
        if !tables.dependents.contains_key(key) {
            return Ok(BindOutcome::DependentMissing);
        }
        let bound = tables.bindings.entry(key.clone()).or_default();
        if bound.contains_key(app) {
            return Ok(BindOutcome::AlreadyBound);
        }
        bound.insert(
            app.clone(),
            Binding {
                app: app.clone(),
                dependent: key.clone(),
                fingerprint: fingerprint.to_string(),
                bound_at: Utc::now(),
            },
        );
        Ok(BindOutcome::Bound)
    }

    async fn unbind(&self, app: &AppRef, key: &DependentKey) -> Result<bool, GatewayError> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .bindings
            .get_mut(key)
            .and_then(|bound| bound.remove(app))
            .is_some())
    }

    async fn bindings_of_app(&self, app: &AppRef) -> Result<Vec<Binding>, GatewayError> {
        let tables = self.tables.lock().await;
        let mut bindings: Vec<Binding> = tables
            .bindings
            .values()
            .filter_map(|bound| bound.get(app).cloned())
            .collect();
        bindings.sort_by(|a, b| a.dependent.cmp(&b.dependent));
        Ok(bindings)
    }

    async fn bindings_of(&self, key: &DependentKey) -> Result<Vec<Binding>, GatewayError> {
        Ok(self
            .tables
            .lock()
            .await
            .bindings
            .get(key)
            .map(|bound| bound.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_fingerprint(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<(), GatewayError> {
        let mut tables = self.tables.lock().await;
        let binding = tables
            .bindings
            .get_mut(key)
            .and_then(|bound| bound.get_mut(app))
            .ok_or_else(|| GatewayError::not_found("binding", format!("{app} -> {key}")))?;
        binding.fingerprint = fingerprint.to_string();
        Ok(())
    }
}
