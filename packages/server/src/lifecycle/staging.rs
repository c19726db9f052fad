use std::time::Duration;

use chrono::Utc;
use common::retry::calculate_backoff;
use common::storage::BlobUid;
use common::{AppRef, BuildOutcome};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::{Lifecycle, LifecycleError};
use crate::domain::{ApplicationPatch, BuildRun};
use crate::utils::names;

impl Lifecycle {
    /// Start a build of blob `uid` for `app`.
    ///
    /// The blob must belong to `app`. On success the blob becomes the application's
    /// current source and the run its latest stage.
    #[instrument(skip(self, builder_image), fields(app = %app, blob = %uid))]
    pub async fn stage(
        &self,
        app: &AppRef,
        uid: &BlobUid,
        builder_image: Option<&str>,
        principal: &str,
    ) -> Result<BuildRun, LifecycleError> {
        let application = self.require_app(app).await?;
        let meta = self.blobs.meta(uid).await?;
        if let Some((expected, found)) = LifecycleError::mismatch(app, &meta.owner) {
            return Err(LifecycleError::BlobAppMismatch { expected, found });
        }

        let builder_image = builder_image
            .filter(|image| !image.trim().is_empty())
            .map(str::to_string)
            .or(application.builder_image)
            .unwrap_or_else(|| self.settings.default_builder_image.clone());

        let pending = self
            .builds
            .list(app)
            .await?
            .into_iter()
            .filter(|r| r.is_pending())
            .count();
        if pending > 0 {
            debug!(pending, "Staging while earlier runs are still pending");
        }

        let run_id = uuid::Uuid::now_v7().to_string();
        let run = BuildRun {
            image_url: names::image_url(
                &self.settings.registry_url,
                &app.namespace,
                &app.name,
                &run_id,
            ),
            run_id,
            app: app.clone(),
            blob_uid: *uid,
            builder_image,
            started_at: Utc::now(),
            completed_at: None,
            outcome: BuildOutcome::Pending,
            message: None,
        };
        self.builds.submit(&run).await?;

        let patch = ApplicationPatch {
            latest_stage: Some(run.run_id.clone()),
            ..Default::default()
        };
        self.apps.update(app, &patch).await?;
        self.set_current_blob(app, uid).await?;

        info!(
            run_id = %run.run_id,
            principal,
            builder = %run.builder_image,
            "Build submitted"
        );
        Ok(run)
    }

    pub async fn find_stage(&self, run_id: &str) -> Result<BuildRun, LifecycleError> {
        self.builds
            .get(run_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("stage", run_id))
    }

    /// Poll `run_id` until it reaches a final outcome or `timeout` elapses.
    ///
    /// Polls back off exponentially from the configured interval. A timeout leaves
    /// nothing changed.
    #[instrument(skip(self))]
    pub async fn wait_for_completion(
        &self,
        run_id: &str,
        timeout: Duration,
    ) -> Result<BuildOutcome, LifecycleError> {
        let deadline = Instant::now() + timeout;
        let base_ms = self.settings.poll_interval.as_millis() as u64;
        let max_ms = self.settings.max_poll_interval.as_millis() as u64;
        let mut attempt: u8 = 1;

        loop {
            let run = self.find_stage(run_id).await?;
            if run.outcome.is_final() {
                debug!(outcome = %run.outcome, attempts = attempt, "Build finished");
                return Ok(run.outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Timed out waiting for build");
                return Err(LifecycleError::Timeout(run_id.to_string()));
            }
            let delay = calculate_backoff(attempt, base_ms, max_ms).min(deadline - now);
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }
}
