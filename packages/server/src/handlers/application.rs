use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_extra::extract::Query;
use common::AppRef;
use tracing::{instrument, warn};

use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::extractors::principal::Principal;
use crate::lifecycle::LifecycleError;
use crate::models::application::*;
use crate::state::AppState;

/// Multipart overhead allowed on top of the blob size limit.
const MULTIPART_SLACK: u64 = 64 * 1024;

pub fn upload_body_limit(max_blob_size: u64) -> DefaultBodyLimit {
    let limit = max_blob_size.saturating_add(MULTIPART_SLACK);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

#[instrument(skip(state, principal), fields(user = %principal.0))]
pub async fn list_applications(
    principal: Principal,
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let apps = state.lifecycle.list_applications(&namespace).await?;
    Ok(Json(apps.into_iter().map(ApplicationResponse::from).collect()))
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0, app = %payload.name))]
pub async fn create_application(
    principal: Principal,
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    AppJson(payload): AppJson<CreateApplicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let app = AppRef::new(namespace, payload.name.trim());
    state
        .lifecycle
        .create_application(&app, &principal.0, payload.spec())
        .await?;
    let details = state.lifecycle.show_application(&app).await?;
    Ok((StatusCode::CREATED, Json(ApplicationResponse::from(details))))
}

#[instrument(skip(state, principal), fields(user = %principal.0))]
pub async fn show_application(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let details = state
        .lifecycle
        .show_application(&AppRef::new(namespace, name))
        .await?;
    Ok(Json(details.into()))
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0))]
pub async fn update_application(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    AppJson(payload): AppJson<UpdateApplicationRequest>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let details = state
        .lifecycle
        .update_application(&AppRef::new(namespace, name), payload.into())
        .await?;
    Ok(Json(details.into()))
}

#[instrument(skip(state, principal), fields(user = %principal.0))]
pub async fn delete_application(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<ApplicationDeleteResponse>, AppError> {
    delete_batch(&state, &namespace, vec![name]).await
}

#[instrument(skip(state, principal, query), fields(user = %principal.0, count = query.applications.len()))]
pub async fn delete_applications(
    principal: Principal,
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<DeleteApplicationsQuery>,
) -> Result<Json<ApplicationDeleteResponse>, AppError> {
    if query.applications.is_empty() {
        return Err(AppError::Validation(
            "At least one application name is required".into(),
        ));
    }
    delete_batch(&state, &namespace, query.applications).await
}

/// When nothing could be deleted the failures are the error response. Otherwise
/// they are listed in the `errors` field of the success body.
async fn delete_batch(
    state: &AppState,
    namespace: &str,
    names: Vec<String>,
) -> Result<Json<ApplicationDeleteResponse>, AppError> {
    let mut report = state.lifecycle.delete_applications(namespace, &names).await;
    if report.deleted.is_empty() {
        LifecycleError::collect(std::mem::take(&mut report.failures))?;
    }
    for failure in &report.failures {
        warn!(error = %failure, "Partial failure during application deletion");
    }
    Ok(Json(ApplicationDeleteResponse::from(report)))
}

#[instrument(skip(state, principal, multipart), fields(user = %principal.0))]
pub async fn upload(
    principal: Principal,
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let app = AppRef::new(namespace, name);
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file field: {e}")))?;
            data = Some(bytes);
        }
    }
    let data = data.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    let uid = state.lifecycle.upload(&app, &principal.0, &data).await?;
    Ok(Json(UploadResponse {
        blob_uid: uid.to_hex(),
    }))
}
