use std::collections::HashSet;

use common::AppRef;
use common::storage::BlobUid;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{Lifecycle, LifecycleError};

/// One blob (or the whole pass, when `uid` is `None`) that reclaim could not handle.
#[derive(Clone, Debug, Serialize)]
pub struct ReclaimFailure {
    pub uid: Option<BlobUid>,
    pub reason: String,
}

/// Result of a reclaim pass. A pass never fails as a whole; problems land in `failures`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReclaimReport {
    pub deleted: Vec<BlobUid>,
    pub retained: Vec<BlobUid>,
    pub failures: Vec<ReclaimFailure>,
}

impl ReclaimReport {
    fn aborted(reason: impl Into<String>) -> Self {
        Self {
            failures: vec![ReclaimFailure {
                uid: None,
                reason: reason.into(),
            }],
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Lifecycle {
    /// Point the application at `uid` as its current source. Last writer wins.
    pub async fn set_current_blob(&self, app: &AppRef, uid: &BlobUid) -> Result<(), LifecycleError> {
        self.apps.set_current_blob(app, uid).await?;
        Ok(())
    }

    /// The blob `app` was last staged from, for re-staging without an upload.
    pub async fn previous_blob(&self, app: &AppRef) -> Result<BlobUid, LifecycleError> {
        self.require_app(app).await?.current_blob.ok_or_else(|| {
            LifecycleError::Validation(
                "request didn't provide a blobUID and a previous one doesn't exist".into(),
            )
        })
    }

    /// Delete every blob of `app` except the current one, the one the deployed
    /// stage was built from and those a pending build still reads.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn reclaim(&self, app: &AppRef) -> ReclaimReport {
        let blobs = match self.blobs.list(app).await {
            Ok(blobs) => blobs,
            Err(e) => return ReclaimReport::aborted(format!("listing blobs: {e}")),
        };
        let (current, deployed_stage) = match self.apps.find(app).await {
            Ok(Some(a)) => (a.current_blob, a.deployed_stage),
            Ok(None) => (None, None),
            Err(e) => return ReclaimReport::aborted(format!("reading application: {e}")),
        };
        let runs = match self.builds.list(app).await {
            Ok(runs) => runs,
            Err(e) => return ReclaimReport::aborted(format!("listing build runs: {e}")),
        };

        let mut keep: HashSet<BlobUid> = runs
            .iter()
            .filter(|r| r.is_pending() || deployed_stage.as_deref() == Some(r.run_id.as_str()))
            .map(|r| r.blob_uid)
            .collect();
        keep.extend(current);

        let mut report = ReclaimReport::default();
        for uid in blobs {
            if keep.contains(&uid) {
                report.retained.push(uid);
                continue;
            }
            match self.blobs.delete(&uid).await {
                Ok(_) => report.deleted.push(uid),
                Err(e) => {
                    warn!(blob = %uid, error = %e, "Failed to delete blob");
                    report.failures.push(ReclaimFailure {
                        uid: Some(uid),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            deleted = report.deleted.len(),
            retained = report.retained.len(),
            failed = report.failures.len(),
            "Blob reclaim finished"
        );
        report
    }
}
