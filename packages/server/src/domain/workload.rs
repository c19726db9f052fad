use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AppRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::dependent::DependentKind;

/// A dependent's secret mounted into the workload.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundSecret {
    pub kind: DependentKind,
    pub name: String,
    pub secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TlsCertificate {
    pub domain: String,
    pub secret: String,
}

/// Declarative description of what should run for an application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRecord {
    pub app: AppRef,
    pub stage_id: String,
    pub image_url: String,
    pub routes: Vec<String>,
    pub instances: u32,
    pub environment: BTreeMap<String, String>,
    /// Sorted by (kind, name).
    pub bound: Vec<BoundSecret>,
    /// One per distinct route domain, sorted.
    pub certificates: Vec<TlsCertificate>,
    /// Changes whenever a restart is requested without any other change.
    pub restart_marker: Option<String>,
}

impl DeployRecord {
    /// Identity of the pod template this record produces.
    pub fn pod_identity(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain structs, maps and strings cannot fail.
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}

/// Materialized workload as reported by the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub record: DeployRecord,
    /// Incremented each time an apply changes the pod identity.
    pub revision: u64,
    pub pod_identity: String,
    pub applied_at: DateTime<Utc>,
}

impl Workload {
    /// Result of applying `record` on top of `previous`.
    ///
    /// Re-applying an identical record returns `previous` unchanged.
    pub fn next(previous: Option<&Workload>, record: &DeployRecord) -> Workload {
        let identity = record.pod_identity();
        match previous {
            Some(prev) if prev.pod_identity == identity => prev.clone(),
            _ => Workload {
                record: record.clone(),
                revision: previous.map(|p| p.revision + 1).unwrap_or(1),
                pod_identity: identity,
                applied_at: Utc::now(),
            },
        }
    }
}
