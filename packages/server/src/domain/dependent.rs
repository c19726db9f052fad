use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use common::AppRef;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::names;

/// The two resource families an application can depend on.
///
/// Both share one binding contract; they differ in how an update decides on restarts
/// (see [`DependentKind::restarts_only_on_change`]).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sea_orm::DeriveActiveEnum,
    sea_orm::EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum DependentKind {
    #[sea_orm(string_value = "configuration")]
    Configuration,
    #[sea_orm(string_value = "service")]
    Service,
}

impl DependentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Service => "service",
        }
    }

    /// With no explicit restart choice, configurations restart bound apps only when the
    /// content changed; services always restart them.
    pub fn restarts_only_on_change(&self) -> bool {
        matches!(self, Self::Configuration)
    }

    fn secret_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "cfg",
            Self::Service => "svc",
        }
    }
}

impl fmt::Display for DependentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependentKey {
    pub kind: DependentKind,
    pub namespace: String,
    pub name: String,
}

impl DependentKey {
    pub fn new(kind: DependentKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Name of the secret carrying this dependent's content into workloads.
    pub fn secret_name(&self) -> String {
        names::resource_name(&[self.kind.secret_prefix(), &self.namespace, &self.name])
    }
}

impl fmt::Display for DependentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependent {
    pub key: DependentKey,
    /// Catalog entry a service was created from. Always `None` for configurations.
    pub catalog_service: Option<String>,
    pub data: BTreeMap<String, String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Dependent {
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.data)
    }
}

/// Content fingerprint: SHA-256 over the length-prefixed, key-ordered entries.
pub fn fingerprint(data: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Change to a dependent's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentEdit {
    /// Remove keys, then set the given key/values.
    Patch {
        remove: Vec<String>,
        set: BTreeMap<String, String>,
    },
    Replace(BTreeMap<String, String>),
}

impl ContentEdit {
    pub fn apply(&self, current: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        match self {
            Self::Patch { remove, set } => {
                let mut next = current.clone();
                for key in remove {
                    next.remove(key);
                }
                next.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
                next
            }
            Self::Replace(data) => data.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub app: AppRef,
    pub dependent: DependentKey,
    /// Fingerprint of the dependent content at bind time or at the last update.
    pub fingerprint: String,
    pub bound_at: DateTime<Utc>,
}

/// Result of an atomic bind attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindOutcome {
    Bound,
    AlreadyBound,
    DependentMissing,
}

/// Result of an atomic delete-if-unbound attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
    /// Names of the applications still bound; nothing was deleted.
    Bound(Vec<String>),
}
