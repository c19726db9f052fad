use std::sync::Arc;

use async_trait::async_trait;
use common::{AppRef, BuildOutcome, BuildReport};
use mq::{Mq, publish_build_job};
use tracing::{error, instrument};

use crate::domain::{BuildPipeline, BuildRun, GatewayError};

/// Records runs in `inner` and hands each one to the build engine over the queue.
///
/// Completion reports come back through the report consumer, which calls
/// [`BuildPipeline::complete`] on this pipeline.
pub struct QueuedBuildPipeline {
    inner: Arc<dyn BuildPipeline>,
    mq: Arc<Mq>,
    job_queue: String,
}

impl QueuedBuildPipeline {
    pub fn new(inner: Arc<dyn BuildPipeline>, mq: Arc<Mq>, job_queue: impl Into<String>) -> Self {
        Self {
            inner,
            mq,
            job_queue: job_queue.into(),
        }
    }
}

#[async_trait]
impl BuildPipeline for QueuedBuildPipeline {
    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn submit(&self, run: &BuildRun) -> Result<(), GatewayError> {
        self.inner.submit(run).await?;

        if let Err(e) = publish_build_job(&self.mq, &self.job_queue, &run.job()).await {
            error!(error = %e, "Failed to enqueue build job, marking run failed");
            let mut report = BuildReport::new(run.run_id.clone(), BuildOutcome::Failed);
            report.message = Some(e.to_string());
            self.inner.complete(&report).await?;
            return Err(GatewayError::Unavailable(e.to_string()));
        }
        Ok(())
    }

    async fn list(&self, app: &AppRef) -> Result<Vec<BuildRun>, GatewayError> {
        self.inner.list(app).await
    }

    async fn get(&self, run_id: &str) -> Result<Option<BuildRun>, GatewayError> {
        self.inner.get(run_id).await
    }

    async fn complete(&self, report: &BuildReport) -> Result<BuildRun, GatewayError> {
        self.inner.complete(report).await
    }

    async fn forget(&self, app: &AppRef) -> Result<(), GatewayError> {
        self.inner.forget(app).await
    }
}
