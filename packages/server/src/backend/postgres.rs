//! Gateways persisted through sea-orm.
//!
//! Read-modify-write operations run in a transaction holding a `FOR UPDATE` lock on
//! the row they change. `bind` and `delete_unbound` both lock the dependent row, which
//! serializes them against each other.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use common::storage::BlobUid;
use common::{AppRef, BuildOutcome, BuildReport};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{
    Application, ApplicationPatch, ApplicationRepository, BindOutcome, Binding, BuildPipeline,
    BuildRun, DeleteOutcome, Dependent, DependentKey, DependentKind, DependentRepository,
    DeployRecord, GatewayError, Workload, WorkloadRuntime,
};
use crate::entity::{application, binding, build_run, dependent, workload};

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, GatewayError> {
    serde_json::to_value(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::Malformed(e.to_string()))
}

fn parse_uid(hex: &str) -> Result<BlobUid, GatewayError> {
    BlobUid::from_hex(hex).map_err(|e| GatewayError::Malformed(e.to_string()))
}

/// Map unique violations to `Conflict`, everything else through `From<DbErr>`.
fn insert_err(err: DbErr, kind: &'static str, name: &str) -> GatewayError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        GatewayError::conflict(kind, name)
    } else {
        err.into()
    }
}

impl TryFrom<application::Model> for Application {
    type Error = GatewayError;

    fn try_from(model: application::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            app: AppRef::new(model.namespace, model.name),
            created_by: model.created_by,
            builder_image: model.builder_image,
            routes: from_json(model.routes)?,
            instances: u32::try_from(model.instances)
                .map_err(|e| GatewayError::Malformed(e.to_string()))?,
            environment: from_json(model.environment)?,
            current_blob: model.current_blob.as_deref().map(parse_uid).transpose()?,
            latest_stage: model.latest_stage,
            deployed_stage: model.deployed_stage,
            deployed_image: model.deployed_image,
            created_at: model.created_at,
        })
    }
}

fn application_model(app: &Application) -> Result<application::ActiveModel, GatewayError> {
    Ok(application::ActiveModel {
        namespace: Set(app.app.namespace.clone()),
        name: Set(app.app.name.clone()),
        created_by: Set(app.created_by.clone()),
        builder_image: Set(app.builder_image.clone()),
        routes: Set(to_json(&app.routes)?),
        instances: Set(app.instances as i32),
        environment: Set(to_json(&app.environment)?),
        current_blob: Set(app.current_blob.map(|uid| uid.to_hex())),
        latest_stage: Set(app.latest_stage.clone()),
        deployed_stage: Set(app.deployed_stage.clone()),
        deployed_image: Set(app.deployed_image.clone()),
        created_at: Set(app.created_at),
    })
}

pub struct PostgresApplicationRepository {
    db: DatabaseConnection,
}

impl PostgresApplicationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApplicationRepository for PostgresApplicationRepository {
    async fn create(&self, app: &Application) -> Result<(), GatewayError> {
        application_model(app)?
            .insert(&self.db)
            .await
            .map_err(|e| insert_err(e, "application", &app.app.name))?;
        Ok(())
    }

    async fn find(&self, app: &AppRef) -> Result<Option<Application>, GatewayError> {
        application::Entity::find_by_id((app.namespace.clone(), app.name.clone()))
            .one(&self.db)
            .await?
            .map(Application::try_from)
            .transpose()
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Application>, GatewayError> {
        application::Entity::find()
            .filter(application::Column::Namespace.eq(namespace))
            .order_by_asc(application::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Application::try_from)
            .collect()
    }

    async fn update(
        &self,
        app: &AppRef,
        patch: &ApplicationPatch,
    ) -> Result<Application, GatewayError> {
        let txn = self.db.begin().await?;
        let model = application::Entity::find_by_id((app.namespace.clone(), app.name.clone()))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| GatewayError::not_found("application", app.name.clone()))?;

        let mut updated = Application::try_from(model)?;
        updated.apply(patch);
        application_model(&updated)?.update(&txn).await?;
        txn.commit().await?;
        Ok(updated)
    }

    async fn set_current_blob(&self, app: &AppRef, uid: &BlobUid) -> Result<(), GatewayError> {
        let result = application::Entity::update_many()
            .col_expr(application::Column::CurrentBlob, Expr::value(uid.to_hex()))
            .filter(application::Column::Namespace.eq(app.namespace.as_str()))
            .filter(application::Column::Name.eq(app.name.as_str()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(GatewayError::not_found("application", app.name.clone()));
        }
        Ok(())
    }

    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError> {
        let result = application::Entity::delete_by_id((app.namespace.clone(), app.name.clone()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

impl TryFrom<build_run::Model> for BuildRun {
    type Error = GatewayError;

    fn try_from(model: build_run::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            app: AppRef::new(model.namespace, model.app_name),
            blob_uid: parse_uid(&model.blob_uid)?,
            run_id: model.run_id,
            builder_image: model.builder_image,
            image_url: model.image_url,
            started_at: model.started_at,
            completed_at: model.completed_at,
            outcome: model.outcome,
            message: model.message,
        })
    }
}

pub struct PostgresBuildPipeline {
    db: DatabaseConnection,
}

impl PostgresBuildPipeline {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BuildPipeline for PostgresBuildPipeline {
    async fn submit(&self, run: &BuildRun) -> Result<(), GatewayError> {
        build_run::ActiveModel {
            run_id: Set(run.run_id.clone()),
            namespace: Set(run.app.namespace.clone()),
            app_name: Set(run.app.name.clone()),
            blob_uid: Set(run.blob_uid.to_hex()),
            builder_image: Set(run.builder_image.clone()),
            image_url: Set(run.image_url.clone()),
            outcome: Set(run.outcome),
            message: Set(run.message.clone()),
            started_at: Set(run.started_at),
            completed_at: Set(run.completed_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| insert_err(e, "stage", &run.run_id))?;
        Ok(())
    }

    async fn list(&self, app: &AppRef) -> Result<Vec<BuildRun>, GatewayError> {
        build_run::Entity::find()
            .filter(build_run::Column::Namespace.eq(app.namespace.as_str()))
            .filter(build_run::Column::AppName.eq(app.name.as_str()))
            .order_by_asc(build_run::Column::StartedAt)
            .order_by_asc(build_run::Column::RunId)
            .all(&self.db)
            .await?
            .into_iter()
            .map(BuildRun::try_from)
            .collect()
    }

    async fn get(&self, run_id: &str) -> Result<Option<BuildRun>, GatewayError> {
        build_run::Entity::find_by_id(run_id.to_string())
            .one(&self.db)
            .await?
            .map(BuildRun::try_from)
            .transpose()
    }

    async fn complete(&self, report: &BuildReport) -> Result<BuildRun, GatewayError> {
        let txn = self.db.begin().await?;
        let model = build_run::Entity::find_by_id(report.run_id.clone())
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| GatewayError::not_found("stage", report.run_id.clone()))?;

        if model.outcome != BuildOutcome::Pending || !report.outcome.is_final() {
            txn.commit().await?;
            return BuildRun::try_from(model);
        }

        let mut active: build_run::ActiveModel = model.into();
        active.outcome = Set(report.outcome);
        active.completed_at = Set(Some(report.completed_at));
        active.message = Set(report.message.clone());
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        BuildRun::try_from(updated)
    }

    async fn forget(&self, app: &AppRef) -> Result<(), GatewayError> {
        build_run::Entity::delete_many()
            .filter(build_run::Column::Namespace.eq(app.namespace.as_str()))
            .filter(build_run::Column::AppName.eq(app.name.as_str()))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

/// Workloads recorded as rows; `apply` is the materialization point.
pub struct PostgresWorkloadRuntime {
    db: DatabaseConnection,
}

impl PostgresWorkloadRuntime {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TryFrom<workload::Model> for Workload {
    type Error = GatewayError;

    fn try_from(model: workload::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            record: from_json(model.record)?,
            revision: u64::try_from(model.revision)
                .map_err(|e| GatewayError::Malformed(e.to_string()))?,
            pod_identity: model.pod_identity,
            applied_at: model.applied_at,
        })
    }
}

#[async_trait]
impl WorkloadRuntime for PostgresWorkloadRuntime {
    async fn apply(&self, record: &DeployRecord) -> Result<Workload, GatewayError> {
        let app = &record.app;
        let txn = self.db.begin().await?;
        let existing = workload::Entity::find_by_id((app.namespace.clone(), app.name.clone()))
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let previous = existing.clone().map(Workload::try_from).transpose()?;

        let next = Workload::next(previous.as_ref(), record);
        if previous.as_ref() == Some(&next) {
            txn.commit().await?;
            return Ok(next);
        }

        let active = workload::ActiveModel {
            namespace: Set(app.namespace.clone()),
            name: Set(app.name.clone()),
            record: Set(to_json(&next.record)?),
            revision: Set(next.revision as i64),
            pod_identity: Set(next.pod_identity.clone()),
            applied_at: Set(next.applied_at),
        };
        if existing.is_some() {
            active.update(&txn).await?;
        } else {
            active.insert(&txn).await?;
        }
        txn.commit().await?;
        Ok(next)
    }

    async fn get(&self, app: &AppRef) -> Result<Option<Workload>, GatewayError> {
        workload::Entity::find_by_id((app.namespace.clone(), app.name.clone()))
            .one(&self.db)
            .await?
            .map(Workload::try_from)
            .transpose()
    }

    async fn delete(&self, app: &AppRef) -> Result<bool, GatewayError> {
        let result = workload::Entity::delete_by_id((app.namespace.clone(), app.name.clone()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

impl TryFrom<dependent::Model> for Dependent {
    type Error = GatewayError;

    fn try_from(model: dependent::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            key: DependentKey::new(model.kind, model.namespace, model.name),
            catalog_service: model.catalog_service,
            data: from_json(model.data)?,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}

impl From<binding::Model> for Binding {
    fn from(model: binding::Model) -> Self {
        Self {
            dependent: DependentKey::new(model.kind, model.namespace.clone(), model.dependent_name),
            app: AppRef::new(model.namespace, model.app_name),
            fingerprint: model.fingerprint,
            bound_at: model.bound_at,
        }
    }
}

fn dependent_id(key: &DependentKey) -> (DependentKind, String, String) {
    (key.kind, key.namespace.clone(), key.name.clone())
}

fn binding_id(app: &AppRef, key: &DependentKey) -> (String, String, DependentKind, String) {
    (
        app.namespace.clone(),
        app.name.clone(),
        key.kind,
        key.name.clone(),
    )
}

pub struct PostgresDependentRepository {
    db: DatabaseConnection,
}

impl PostgresDependentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DependentRepository for PostgresDependentRepository {
    async fn create(&self, dependent: &Dependent) -> Result<(), GatewayError> {
        dependent::ActiveModel {
            kind: Set(dependent.key.kind),
            namespace: Set(dependent.key.namespace.clone()),
            name: Set(dependent.key.name.clone()),
            catalog_service: Set(dependent.catalog_service.clone()),
            data: Set(to_json(&dependent.data)?),
            created_by: Set(dependent.created_by.clone()),
            created_at: Set(dependent.created_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| insert_err(e, dependent.key.kind.as_str(), &dependent.key.name))?;
        Ok(())
    }

    async fn find(&self, key: &DependentKey) -> Result<Option<Dependent>, GatewayError> {
        dependent::Entity::find_by_id(dependent_id(key))
            .one(&self.db)
            .await?
            .map(Dependent::try_from)
            .transpose()
    }

    async fn list(
        &self,
        kind: DependentKind,
        namespace: &str,
    ) -> Result<Vec<Dependent>, GatewayError> {
        dependent::Entity::find()
            .filter(dependent::Column::Kind.eq(kind))
            .filter(dependent::Column::Namespace.eq(namespace))
            .order_by_asc(dependent::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Dependent::try_from)
            .collect()
    }

    async fn update_data(
        &self,
        key: &DependentKey,
        data: &BTreeMap<String, String>,
    ) -> Result<Dependent, GatewayError> {
        let txn = self.db.begin().await?;
        let model = dependent::Entity::find_by_id(dependent_id(key))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| GatewayError::not_found(key.kind.as_str(), key.name.clone()))?;

        let mut active: dependent::ActiveModel = model.into();
        active.data = Set(to_json(data)?);
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Dependent::try_from(updated)
    }

    async fn delete_unbound(&self, key: &DependentKey) -> Result<DeleteOutcome, GatewayError> {
        let txn = self.db.begin().await?;
        let locked = dependent::Entity::find_by_id(dependent_id(key))
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        if locked.is_none() {
            txn.commit().await?;
            return Ok(DeleteOutcome::Missing);
        }

        let bound: Vec<String> = binding::Entity::find()
            .filter(binding::Column::Namespace.eq(key.namespace.as_str()))
            .filter(binding::Column::Kind.eq(key.kind))
            .filter(binding::Column::DependentName.eq(key.name.as_str()))
            .order_by_asc(binding::Column::AppName)
            .all(&txn)
            .await?
            .into_iter()
            .map(|b| b.app_name)
            .collect();
        if !bound.is_empty() {
            txn.commit().await?;
            return Ok(DeleteOutcome::Bound(bound));
        }

        dependent::Entity::delete_by_id(dependent_id(key))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn bind(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<BindOutcome, GatewayError> {
        let txn = self.db.begin().await?;
        let locked = dependent::Entity::find_by_id(dependent_id(key))
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        if locked.is_none() {
            txn.commit().await?;
            return Ok(BindOutcome::DependentMissing);
        }

        let existing = binding::Entity::find_by_id(binding_id(app, key))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.commit().await?;
            return Ok(BindOutcome::AlreadyBound);
        }

        binding::ActiveModel {
            namespace: Set(app.namespace.clone()),
            app_name: Set(app.name.clone()),
            kind: Set(key.kind),
            dependent_name: Set(key.name.clone()),
            fingerprint: Set(fingerprint.to_string()),
            bound_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        Ok(BindOutcome::Bound)
    }

    async fn unbind(&self, app: &AppRef, key: &DependentKey) -> Result<bool, GatewayError> {
        let result = binding::Entity::delete_by_id(binding_id(app, key))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn bindings_of_app(&self, app: &AppRef) -> Result<Vec<Binding>, GatewayError> {
        Ok(binding::Entity::find()
            .filter(binding::Column::Namespace.eq(app.namespace.as_str()))
            .filter(binding::Column::AppName.eq(app.name.as_str()))
            .order_by_asc(binding::Column::Kind)
            .order_by_asc(binding::Column::DependentName)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Binding::from)
            .collect())
    }

    async fn bindings_of(&self, key: &DependentKey) -> Result<Vec<Binding>, GatewayError> {
        Ok(binding::Entity::find()
            .filter(binding::Column::Namespace.eq(key.namespace.as_str()))
            .filter(binding::Column::Kind.eq(key.kind))
            .filter(binding::Column::DependentName.eq(key.name.as_str()))
            .order_by_asc(binding::Column::AppName)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Binding::from)
            .collect())
    }

    async fn set_fingerprint(
        &self,
        app: &AppRef,
        key: &DependentKey,
        fingerprint: &str,
    ) -> Result<(), GatewayError> {
        let result = binding::Entity::update_many()
            .col_expr(binding::Column::Fingerprint, Expr::value(fingerprint))
            .filter(binding::Column::Namespace.eq(app.namespace.as_str()))
            .filter(binding::Column::AppName.eq(app.name.as_str()))
            .filter(binding::Column::Kind.eq(key.kind))
            .filter(binding::Column::DependentName.eq(key.name.as_str()))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(GatewayError::not_found("binding", format!("{app} -> {key}")));
        }
        Ok(())
    }
}
