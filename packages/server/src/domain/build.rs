use chrono::{DateTime, Utc};
use common::storage::BlobUid;
use common::{AppRef, BuildJob, BuildOutcome};
use serde::{Deserialize, Serialize};

/// One build of one blob for one application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRun {
    pub run_id: String,
    pub app: AppRef,
    pub blob_uid: BlobUid,
    pub builder_image: String,
    pub image_url: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outcome: BuildOutcome,
    pub message: Option<String>,
}

impl BuildRun {
    pub fn is_pending(&self) -> bool {
        self.outcome == BuildOutcome::Pending
    }

    /// The message handed to the build pipeline for this run.
    pub fn job(&self) -> BuildJob {
        BuildJob {
            run_id: self.run_id.clone(),
            app: self.app.clone(),
            blob_uid: self.blob_uid.to_hex(),
            builder_image: self.builder_image.clone(),
            image_url: self.image_url.clone(),
            submitted_at: self.started_at,
        }
    }
}
