use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::AppRef;
use common::storage::BlobUid;
use serde::{Deserialize, Serialize};

/// Application resource as held by the orchestration platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub app: AppRef,
    pub created_by: String,
    /// Overrides the configured default builder image.
    pub builder_image: Option<String>,
    pub routes: Vec<String>,
    pub instances: u32,
    pub environment: BTreeMap<String, String>,
    /// Blob of the most recently requested stage.
    pub current_blob: Option<BlobUid>,
    /// Most recently requested stage.
    pub latest_stage: Option<String>,
    pub deployed_stage: Option<String>,
    pub deployed_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn new(app: AppRef, created_by: impl Into<String>) -> Self {
        Self {
            app,
            created_by: created_by.into(),
            builder_image: None,
            routes: Vec::new(),
            instances: 1,
            environment: BTreeMap::new(),
            current_blob: None,
            latest_stage: None,
            deployed_stage: None,
            deployed_image: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.deployed_image.is_some()
    }

    /// Apply a partial update in place. `None` fields are left untouched.
    pub fn apply(&mut self, patch: &ApplicationPatch) {
        if let Some(routes) = &patch.routes {
            self.routes = routes.clone();
        }
        if let Some(instances) = patch.instances {
            self.instances = instances;
        }
        if let Some(environment) = &patch.environment {
            self.environment = environment.clone();
        }
        if let Some(builder_image) = &patch.builder_image {
            self.builder_image = Some(builder_image.clone());
        }
        if let Some(stage) = &patch.latest_stage {
            self.latest_stage = Some(stage.clone());
        }
        if let Some((stage, image)) = &patch.deployed {
            self.deployed_stage = Some(stage.clone());
            self.deployed_image = Some(image.clone());
        }
    }
}

/// Partial update of an [`Application`].
///
/// The current blob pointer is written only through
/// `ApplicationRepository::set_current_blob`.
#[derive(Clone, Debug, Default)]
pub struct ApplicationPatch {
    pub routes: Option<Vec<String>>,
    pub instances: Option<u32>,
    pub environment: Option<BTreeMap<String, String>>,
    pub builder_image: Option<String>,
    pub latest_stage: Option<String>,
    /// (stage id, image url) of a deploy that was accepted.
    pub deployed: Option<(String, String)>,
}

impl ApplicationPatch {
    pub fn is_empty(&self) -> bool {
        self.routes.is_none()
            && self.instances.is_none()
            && self.environment.is_none()
            && self.builder_image.is_none()
            && self.latest_stage.is_none()
            && self.deployed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_only_touches_given_fields() {
        let mut app = Application::new(AppRef::new("workspace", "foo"), "alice");
        app.routes = vec!["foo.example.com".into()];

        app.apply(&ApplicationPatch {
            instances: Some(3),
            ..Default::default()
        });

        assert_eq!(app.instances, 3);
        assert_eq!(app.routes, vec!["foo.example.com".to_string()]);
        assert!(!app.is_deployed());
    }

    #[test]
    fn deployed_sets_stage_and_image_together() {
        let mut app = Application::new(AppRef::new("workspace", "foo"), "alice");
        app.apply(&ApplicationPatch {
            deployed: Some(("s1".into(), "registry/workspace-foo:s1".into())),
            ..Default::default()
        });
        assert!(app.is_deployed());
        assert_eq!(app.deployed_stage.as_deref(), Some("s1"));
    }
}
