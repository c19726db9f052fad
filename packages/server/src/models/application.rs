use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ApplicationPatch, Workload};
use crate::error::{ErrorItem, lifecycle_items};
use crate::lifecycle::{ApplicationDetails, ApplicationSpec, DeletionReport};

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub routes: Vec<String>,
    pub instances: Option<u32>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(rename = "builderimage")]
    pub builder_image: Option<String>,
}

impl CreateApplicationRequest {
    pub fn spec(self) -> ApplicationSpec {
        ApplicationSpec {
            routes: self.routes,
            instances: self.instances,
            environment: self.environment,
            builder_image: self.builder_image,
        }
    }
}

/// Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApplicationRequest {
    pub routes: Option<Vec<String>>,
    pub instances: Option<u32>,
    pub environment: Option<BTreeMap<String, String>>,
    #[serde(rename = "builderimage")]
    pub builder_image: Option<String>,
}

impl From<UpdateApplicationRequest> for ApplicationPatch {
    fn from(req: UpdateApplicationRequest) -> Self {
        ApplicationPatch {
            routes: req.routes,
            instances: req.instances,
            environment: req.environment,
            builder_image: req.builder_image,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkloadSummary {
    pub revision: u64,
    pub instances: u32,
    pub image: String,
    pub stage_id: String,
    pub applied_at: DateTime<Utc>,
}

impl From<Workload> for WorkloadSummary {
    fn from(w: Workload) -> Self {
        Self {
            revision: w.revision,
            instances: w.record.instances,
            image: w.record.image_url,
            stage_id: w.record.stage_id,
            applied_at: w.applied_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub namespace: String,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub routes: Vec<String>,
    pub instances: u32,
    pub environment: BTreeMap<String, String>,
    #[serde(rename = "builderimage")]
    pub builder_image: Option<String>,
    #[serde(rename = "blobuid")]
    pub current_blob: Option<String>,
    pub latest_stage: Option<String>,
    pub deployed_stage: Option<String>,
    pub image: Option<String>,
    /// `deployed` once a workload exists, `created` otherwise.
    pub status: &'static str,
    pub configurations: Vec<String>,
    pub services: Vec<String>,
    pub workload: Option<WorkloadSummary>,
}

impl From<ApplicationDetails> for ApplicationResponse {
    fn from(details: ApplicationDetails) -> Self {
        let app = details.application;
        Self {
            namespace: app.app.namespace,
            name: app.app.name,
            created_by: app.created_by,
            created_at: app.created_at,
            routes: app.routes,
            instances: app.instances,
            environment: app.environment,
            builder_image: app.builder_image,
            current_blob: app.current_blob.map(|uid| uid.to_hex()),
            latest_stage: app.latest_stage,
            deployed_stage: app.deployed_stage,
            image: app.deployed_image,
            status: if details.workload.is_some() {
                "deployed"
            } else {
                "created"
            },
            configurations: details.configurations,
            services: details.services,
            workload: details.workload.map(WorkloadSummary::from),
        }
    }
}

/// `DELETE /applications?applications[]=a&applications[]=b`
#[derive(Debug, Deserialize)]
pub struct DeleteApplicationsQuery {
    #[serde(rename = "applications[]", default)]
    pub applications: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDeleteResponse {
    #[serde(rename = "unboundconfigurations")]
    pub unbound_configurations: Vec<String>,
    #[serde(rename = "unboundservices")]
    pub unbound_services: Vec<String>,
    /// Applications that could not be deleted while others were.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorItem>,
}

impl From<DeletionReport> for ApplicationDeleteResponse {
    fn from(report: DeletionReport) -> Self {
        Self {
            unbound_configurations: report.unbound_configurations,
            unbound_services: report.unbound_services,
            errors: report.failures.into_iter().flat_map(lifecycle_items).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(rename = "blobuid")]
    pub blob_uid: String,
}
