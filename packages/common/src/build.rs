use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_ref::AppRef;
use crate::build_outcome::BuildOutcome;

/// A build job message sent to the build pipeline queue.
///
/// The pipeline reports completion against `run_id`, so the tag triple
/// (app, blob, run) always identifies the exact run being built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildJob {
    /// Build run identifier (UUIDv7).
    pub run_id: String,
    /// Application whose sources are built.
    pub app: AppRef,
    /// Blob holding the uploaded sources.
    pub blob_uid: String,
    /// Builder image performing the build.
    pub builder_image: String,
    /// Image reference the pipeline must push to.
    pub image_url: String,
    pub submitted_at: DateTime<Utc>,
}

/// Completion report published by the build pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildReport {
    pub run_id: String,
    /// Final outcome. A `Pending` report is ignored by consumers.
    pub outcome: BuildOutcome,
    pub completed_at: DateTime<Utc>,
    /// Pipeline-supplied reason on failure.
    #[serde(default)]
    pub message: Option<String>,
}

impl BuildReport {
    pub fn new(run_id: impl Into<String>, outcome: BuildOutcome) -> Self {
        Self {
            run_id: run_id.into(),
            outcome,
            completed_at: Utc::now(),
            message: None,
        }
    }
}
