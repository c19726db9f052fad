use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AppRef;
use common::storage::BlobUid;
use tracing::instrument;

use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::extractors::principal::Principal;
use crate::lifecycle::{DeployRequest, LifecycleError};
use crate::models::shared::StageRef;
use crate::models::staging::*;
use crate::state::AppState;

#[instrument(skip(state, principal, payload), fields(user = %principal.0, blob = ?payload.blob_uid))]
pub async fn stage(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    AppJson(payload): AppJson<StageRequest>,
) -> Result<Json<StageResponse>, AppError> {
    let app = AppRef::new(namespace, name);
    let requested = payload
        .blob_uid
        .as_deref()
        .map(str::trim)
        .filter(|hex| !hex.is_empty());
    let uid = match requested {
        Some(hex) => BlobUid::from_hex(hex)
            .map_err(|e| AppError::Validation(format!("Invalid blob UID: {e}")))?,
        None => state.lifecycle.previous_blob(&app).await?,
    };

    let run = state
        .lifecycle
        .stage(
            &app,
            &uid,
            payload.builder_image.as_deref(),
            &principal.0,
        )
        .await?;

    Ok(Json(StageResponse {
        stage: StageRef { id: run.run_id },
        image: run.image_url,
    }))
}

/// Wait a bounded time for a build run to finish.
///
/// Answers `waiting` when the run is still pending at the deadline, so clients
/// poll this endpoint until they see `succeeded` or `failed`.
#[instrument(skip(state, principal), fields(user = %principal.0))]
pub async fn stage_complete(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, stage_id)): Path<(String, String)>,
) -> Result<Json<StageStatusResponse>, AppError> {
    let run = state.lifecycle.find_stage(&stage_id).await?;
    if run.app.namespace != namespace {
        return Err(LifecycleError::not_found("stage", stage_id).into());
    }

    let timeout = Duration::from_secs(state.config.staging.complete_timeout_secs);
    let status = match state.lifecycle.wait_for_completion(&stage_id, timeout).await {
        Ok(outcome) => outcome.as_str(),
        Err(LifecycleError::Timeout(_)) => "waiting",
        Err(e) => return Err(e.into()),
    };
    Ok(Json(StageStatusResponse { status }))
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0, stage = %payload.stage.id))]
pub async fn deploy(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    AppJson(payload): AppJson<DeployRequestBody>,
) -> Result<Json<DeployResponse>, AppError> {
    if payload.stage.id.trim().is_empty() {
        return Err(AppError::Validation("stage.id is required".into()));
    }

    let request = DeployRequest {
        stage_id: payload.stage.id,
        image_url: payload.image,
        routes: payload.routes,
        instances: payload.instances,
    };
    let outcome = state
        .lifecycle
        .deploy(&AppRef::new(namespace, name), request, &principal.0)
        .await?;

    Ok(Json(DeployResponse {
        routes: outcome.application.routes,
    }))
}

#[instrument(skip(state, principal), fields(user = %principal.0))]
pub async fn restart(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .lifecycle
        .restart(&AppRef::new(namespace, name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
