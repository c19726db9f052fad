use common::AppRef;
use tracing::{info, instrument, warn};

use super::{Lifecycle, LifecycleError};
use crate::domain::DependentKind;

/// Outcome of a batch deletion. Applications are deleted independently, so a
/// report can carry both deletions and failures.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub unbound_configurations: Vec<String>,
    pub unbound_services: Vec<String>,
    pub failures: Vec<LifecycleError>,
}

impl Lifecycle {
    /// Delete the named applications of `namespace`.
    ///
    /// For each one: every binding is removed, then the workload, build runs and
    /// resource, then all of its blobs. A failure stops work on that application
    /// only; steps already done are not rolled back.
    #[instrument(skip(self, names), fields(count = names.len()))]
    pub async fn delete_applications(&self, namespace: &str, names: &[String]) -> DeletionReport {
        let mut report = DeletionReport::default();
        for name in names {
            let app = AppRef::new(namespace, name.clone());
            if let Err(e) = self.delete_application(&app, &mut report).await {
                warn!(app = %app, error = %e, "Application deletion failed");
                report.failures.push(e);
            }
        }
        report.unbound_configurations.sort();
        report.unbound_configurations.dedup();
        report.unbound_services.sort();
        report.unbound_services.dedup();
        report
    }

    async fn delete_application(
        &self,
        app: &AppRef,
        report: &mut DeletionReport,
    ) -> Result<(), LifecycleError> {
        self.require_app(app).await?;

        for binding in self.dependents.bindings_of_app(app).await? {
            let _guard = self.lock_dependent(&binding.dependent).await;
            if self.dependents.unbind(app, &binding.dependent).await? {
                let name = binding.dependent.name;
                match binding.dependent.kind {
                    DependentKind::Configuration => report.unbound_configurations.push(name),
                    DependentKind::Service => report.unbound_services.push(name),
                }
            }
        }

        self.workloads.delete(app).await?;
        self.builds.forget(app).await?;
        self.apps.delete(app).await?;
        report.deleted.push(app.name.clone());

        let mut blob_errors = Vec::new();
        for uid in self.blobs.list(app).await? {
            if let Err(e) = self.blobs.delete(&uid).await {
                blob_errors.push(LifecycleError::from(e));
            }
        }
        info!(app = %app, blob_failures = blob_errors.len(), "Application deleted");
        LifecycleError::collect(blob_errors)
    }
}
