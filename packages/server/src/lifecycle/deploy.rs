use common::{AppRef, BuildOutcome};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{Lifecycle, LifecycleError, ReclaimReport};
use crate::domain::{Application, ApplicationPatch, Workload};

/// Input of a deploy. `routes` and `instances` override the stored application spec.
#[derive(Clone, Debug, Default)]
pub struct DeployRequest {
    pub stage_id: String,
    /// Empty means: the image the stage produced.
    pub image_url: String,
    pub routes: Option<Vec<String>>,
    pub instances: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeployOutcome {
    pub application: Application,
    pub workload: Workload,
    pub reclaim: ReclaimReport,
}

impl Lifecycle {
    /// Deploy the image built by a succeeded stage, then reclaim unreferenced blobs.
    ///
    /// Nothing is changed when validation fails. Reclaim failures are logged and
    /// returned but never fail the deploy.
    #[instrument(skip(self, request), fields(app = %app, stage = %request.stage_id))]
    pub async fn deploy(
        &self,
        app: &AppRef,
        request: DeployRequest,
        principal: &str,
    ) -> Result<DeployOutcome, LifecycleError> {
        let application = self.require_app(app).await?;
        let run = self.find_stage(&request.stage_id).await?;
        if let Some((expected, found)) = LifecycleError::mismatch(app, &run.app) {
            return Err(LifecycleError::StageAppMismatch { expected, found });
        }
        if run.outcome != BuildOutcome::Succeeded {
            return Err(LifecycleError::StageNotSucceeded {
                stage_id: run.run_id,
                outcome: run.outcome,
            });
        }

        let image_url = if request.image_url.trim().is_empty() {
            run.image_url.clone()
        } else {
            request.image_url.clone()
        };

        let spec = ApplicationPatch {
            routes: request.routes.clone(),
            instances: request.instances,
            ..Default::default()
        };
        let mut target = application;
        target.apply(&spec);

        let previous_marker = self
            .workloads
            .get(app)
            .await?
            .and_then(|w| w.record.restart_marker);
        let record = self
            .deploy_record(&target, &run.run_id, &image_url, previous_marker)
            .await?;
        let workload = self.workloads.apply(&record).await?;

        let accepted = ApplicationPatch {
            deployed: Some((run.run_id.clone(), image_url)),
            ..spec
        };
        let application = self.apps.update(app, &accepted).await?;
        info!(
            principal,
            revision = workload.revision,
            image = %record.image_url,
            "Application deployed"
        );

        let reclaim = self.reclaim(app).await;
        if !reclaim.is_clean() {
            warn!(
                failures = reclaim.failures.len(),
                "Blob reclaim after deploy was incomplete"
            );
        }

        Ok(DeployOutcome {
            application,
            workload,
            reclaim,
        })
    }

    /// Roll the workload of a deployed application without changing its spec.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn restart(&self, app: &AppRef) -> Result<Workload, LifecycleError> {
        self.require_app(app).await?;
        self.refresh_workload(app, true)
            .await?
            .ok_or_else(|| LifecycleError::NotDeployed(app.name.clone()))
    }
}
