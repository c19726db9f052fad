use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ContentEdit, Dependent, DependentKind};

#[derive(Debug, Deserialize)]
pub struct CreateDependentRequest {
    pub name: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Catalog entry a service is provisioned from. Ignored for configurations.
    #[serde(rename = "catalogservice")]
    pub catalog_service: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DependentResponse {
    pub namespace: String,
    pub name: String,
    pub kind: DependentKind,
    #[serde(rename = "catalogservice", skip_serializing_if = "Option::is_none")]
    pub catalog_service: Option<String>,
    pub data: BTreeMap<String, String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "boundapps")]
    pub bound_apps: Vec<String>,
}

impl DependentResponse {
    pub fn new(dependent: Dependent, bound_apps: Vec<String>) -> Self {
        Self {
            namespace: dependent.key.namespace,
            name: dependent.key.name,
            kind: dependent.key.kind,
            catalog_service: dependent.catalog_service,
            data: dependent.data,
            created_by: dependent.created_by,
            created_at: dependent.created_at,
            bound_apps,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BindResponse {
    /// Names that were bound before the request.
    #[serde(rename = "wasbound")]
    pub was_bound: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DependentDeleteRequest {
    #[serde(default)]
    pub unbind: bool,
}

#[derive(Debug, Serialize)]
pub struct DependentDeleteResponse {
    /// Applications the dependent was unbound from.
    #[serde(rename = "boundapps")]
    pub bound_apps: Vec<String>,
}

/// `PATCH`: keys in `remove` are dropped, then `edit` is merged in.
#[derive(Debug, Default, Deserialize)]
pub struct DependentPatchRequest {
    #[serde(default)]
    pub remove: Vec<String>,
    #[serde(default)]
    pub edit: BTreeMap<String, String>,
    pub restart: Option<bool>,
}

impl DependentPatchRequest {
    pub fn edit(self) -> (ContentEdit, Option<bool>) {
        (
            ContentEdit::Patch {
                remove: self.remove,
                set: self.edit,
            },
            self.restart,
        )
    }
}

/// `PUT`: the content is replaced with `data`.
#[derive(Debug, Deserialize)]
pub struct DependentReplaceRequest {
    pub data: BTreeMap<String, String>,
    pub restart: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DependentUpdateResponse {
    pub data: BTreeMap<String, String>,
    /// Bound applications whose workloads were restarted.
    pub restarted: Vec<String>,
}
