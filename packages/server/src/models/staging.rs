use serde::{Deserialize, Serialize};

use super::shared::StageRef;

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    /// Absent or empty: re-stage the application's current blob.
    #[serde(rename = "blobuid", default)]
    pub blob_uid: Option<String>,
    #[serde(rename = "builderimage")]
    pub builder_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub stage: StageRef,
    /// Image the build pushes to.
    pub image: String,
}

/// `waiting`, `succeeded` or `failed`.
#[derive(Debug, Serialize)]
pub struct StageStatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct DeployRequestBody {
    pub stage: StageRef,
    /// Empty or absent: the image the stage built.
    #[serde(default)]
    pub image: String,
    pub routes: Option<Vec<String>>,
    pub instances: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub routes: Vec<String>,
}
