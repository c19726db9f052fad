use std::collections::BTreeMap;

use common::AppRef;
use common::storage::{BlobUid, BlobUpload};
use serde::Serialize;
use tracing::{info, instrument};

use super::{Lifecycle, LifecycleError};
use crate::domain::{Application, ApplicationPatch, DependentKind, Workload};
use crate::utils::names;

/// Archive types accepted as application source.
const ACCEPTED_ARCHIVES: &[&str] = &[
    "application/zip",
    "application/x-tar",
    "application/gzip",
    "application/x-bzip2",
    "application/x-xz",
];

/// Desired state supplied when creating an application.
#[derive(Clone, Debug, Default)]
pub struct ApplicationSpec {
    pub routes: Vec<String>,
    pub instances: Option<u32>,
    pub environment: BTreeMap<String, String>,
    pub builder_image: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApplicationDetails {
    pub application: Application,
    pub workload: Option<Workload>,
    pub configurations: Vec<String>,
    pub services: Vec<String>,
}

impl Lifecycle {
    #[instrument(skip(self, spec), fields(app = %app))]
    pub async fn create_application(
        &self,
        app: &AppRef,
        principal: &str,
        spec: ApplicationSpec,
    ) -> Result<Application, LifecycleError> {
        names::validate_name("application", &app.name).map_err(LifecycleError::Validation)?;
        if spec.instances == Some(0) {
            return Err(LifecycleError::Validation(
                "instances must be at least 1".into(),
            ));
        }

        let mut application = Application::new(app.clone(), principal);
        application.apply(&ApplicationPatch {
            routes: Some(spec.routes),
            instances: spec.instances,
            environment: Some(spec.environment),
            builder_image: spec.builder_image,
            ..Default::default()
        });
        self.apps.create(&application).await?;
        info!(principal, "Application created");
        Ok(application)
    }

    pub async fn show_application(&self, app: &AppRef) -> Result<ApplicationDetails, LifecycleError> {
        let application = self.require_app(app).await?;
        self.details(application).await
    }

    pub async fn list_applications(
        &self,
        namespace: &str,
    ) -> Result<Vec<ApplicationDetails>, LifecycleError> {
        let mut listed = Vec::new();
        for application in self.apps.list(namespace).await? {
            listed.push(self.details(application).await?);
        }
        Ok(listed)
    }

    /// Change the stored spec and re-apply the workload if the application is deployed.
    #[instrument(skip(self, patch), fields(app = %app))]
    pub async fn update_application(
        &self,
        app: &AppRef,
        patch: ApplicationPatch,
    ) -> Result<ApplicationDetails, LifecycleError> {
        if patch.instances == Some(0) {
            return Err(LifecycleError::Validation(
                "instances must be at least 1".into(),
            ));
        }
        self.require_app(app).await?;
        let application = self.apps.update(app, &patch).await?;
        self.refresh_workload(app, false).await?;
        self.details(application).await
    }

    /// Store an uploaded source archive for `app` and return its blob UID.
    ///
    /// The archive type is sniffed from the content. Uploading does not change the
    /// application's current blob; staging does.
    #[instrument(skip(self, data), fields(app = %app, size = data.len()))]
    pub async fn upload(
        &self,
        app: &AppRef,
        principal: &str,
        data: &[u8],
    ) -> Result<BlobUid, LifecycleError> {
        self.require_app(app).await?;
        if data.is_empty() {
            return Err(LifecycleError::Validation("upload is empty".into()));
        }
        let mime = infer::get(data).map(|t| t.mime_type());
        if !mime.is_some_and(|m| ACCEPTED_ARCHIVES.contains(&m)) {
            return Err(LifecycleError::Validation(format!(
                "upload is not a supported archive (detected: {})",
                mime.unwrap_or("unknown")
            )));
        }

        let uid = self
            .blobs
            .put(data, BlobUpload::new(app.clone(), principal))
            .await?;
        info!(blob = %uid, "Source uploaded");
        Ok(uid)
    }

    async fn details(&self, application: Application) -> Result<ApplicationDetails, LifecycleError> {
        let workload = self.workloads.get(&application.app).await?;
        let mut configurations = Vec::new();
        let mut services = Vec::new();
        for binding in self.dependents.bindings_of_app(&application.app).await? {
            match binding.dependent.kind {
                DependentKind::Configuration => configurations.push(binding.dependent.name),
                DependentKind::Service => services.push(binding.dependent.name),
            }
        }
        Ok(ApplicationDetails {
            application,
            workload,
            configurations,
            services,
        })
    }
}
