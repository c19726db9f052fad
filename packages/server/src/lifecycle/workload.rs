use std::collections::BTreeSet;

use common::AppRef;
use tracing::{debug, instrument};

use super::{Lifecycle, LifecycleError};
use crate::domain::{Application, BoundSecret, DeployRecord, TlsCertificate, Workload};
use crate::utils::names;

impl Lifecycle {
    /// Assemble the deploy record for `app` from its stored spec and current bindings.
    pub(crate) async fn deploy_record(
        &self,
        app: &Application,
        stage_id: &str,
        image_url: &str,
        restart_marker: Option<String>,
    ) -> Result<DeployRecord, LifecycleError> {
        let mut bound: Vec<BoundSecret> = self
            .dependents
            .bindings_of_app(&app.app)
            .await?
            .into_iter()
            .map(|binding| BoundSecret {
                kind: binding.dependent.kind,
                secret: binding.dependent.secret_name(),
                name: binding.dependent.name,
            })
            .collect();
        bound.sort();

        let domains: BTreeSet<String> = app.routes.iter().map(|r| names::route_domain(r)).collect();
        let certificates = domains
            .into_iter()
            .map(|domain| TlsCertificate {
                secret: names::resource_name(&[&app.app.namespace, &app.app.name, &domain, "tls"]),
                domain,
            })
            .collect();

        Ok(DeployRecord {
            app: app.app.clone(),
            stage_id: stage_id.to_string(),
            image_url: image_url.to_string(),
            routes: app.routes.clone(),
            instances: app.instances,
            environment: app.environment.clone(),
            bound,
            certificates,
            restart_marker,
        })
    }

    /// Re-apply the workload of `app` from its current state.
    ///
    /// With `restart`, a fresh restart marker forces a new pod identity. Returns
    /// `None` without touching anything when the application has no workload.
    #[instrument(skip(self), fields(app = %app))]
    pub(crate) async fn refresh_workload(
        &self,
        app: &AppRef,
        restart: bool,
    ) -> Result<Option<Workload>, LifecycleError> {
        let Some(current) = self.workloads.get(app).await? else {
            debug!("No workload, nothing to refresh");
            return Ok(None);
        };
        let application = self.require_app(app).await?;

        let marker = if restart {
            Some(uuid::Uuid::now_v7().to_string())
        } else {
            current.record.restart_marker.clone()
        };
        let record = self
            .deploy_record(
                &application,
                &current.record.stage_id,
                &current.record.image_url,
                marker,
            )
            .await?;

        let workload = self.workloads.apply(&record).await?;
        debug!(
            revision = workload.revision,
            restarted = workload.revision != current.revision,
            "Workload refreshed"
        );
        Ok(Some(workload))
    }
}
