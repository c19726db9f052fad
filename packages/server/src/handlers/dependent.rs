//! Configuration and service resources.
//!
//! Both kinds share these handlers; the router attaches the kind as an
//! `Extension<DependentKind>`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use tracing::instrument;

use crate::domain::{ContentEdit, DependentKey, DependentKind};
use crate::error::AppError;
use crate::extractors::json::{AppJson, OptionalJson};
use crate::extractors::principal::Principal;
use crate::models::dependent::*;
use crate::state::AppState;

#[instrument(skip(state, principal), fields(user = %principal.0, kind = %kind))]
pub async fn list_dependents(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<DependentResponse>>, AppError> {
    let listed = state.lifecycle.list_dependents(kind, &namespace).await?;
    Ok(Json(
        listed
            .into_iter()
            .map(|(dependent, apps)| DependentResponse::new(dependent, apps))
            .collect(),
    ))
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0, kind = %kind, name = %payload.name))]
pub async fn create_dependent(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path(namespace): Path<String>,
    AppJson(payload): AppJson<CreateDependentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let catalog_service = match kind {
        DependentKind::Service => payload.catalog_service,
        DependentKind::Configuration => None,
    };
    let key = DependentKey::new(kind, namespace, payload.name.trim());
    let dependent = state
        .lifecycle
        .create_dependent(key, catalog_service, payload.data, &principal.0)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DependentResponse::new(dependent, Vec::new())),
    ))
}

#[instrument(skip(state, principal), fields(user = %principal.0, kind = %kind))]
pub async fn show_dependent(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<DependentResponse>, AppError> {
    let key = DependentKey::new(kind, namespace, name);
    let (dependent, apps) = state.lifecycle.show_dependent(&key).await?;
    Ok(Json(DependentResponse::new(dependent, apps)))
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0, kind = %kind))]
pub async fn patch_dependent(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, name)): Path<(String, String)>,
    AppJson(payload): AppJson<DependentPatchRequest>,
) -> Result<Json<DependentUpdateResponse>, AppError> {
    let (edit, restart) = payload.edit();
    update(&state, DependentKey::new(kind, namespace, name), edit, restart).await
}

#[instrument(skip(state, principal, payload), fields(user = %principal.0, kind = %kind))]
pub async fn replace_dependent(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, name)): Path<(String, String)>,
    AppJson(payload): AppJson<DependentReplaceRequest>,
) -> Result<Json<DependentUpdateResponse>, AppError> {
    let edit = ContentEdit::Replace(payload.data);
    update(
        &state,
        DependentKey::new(kind, namespace, name),
        edit,
        payload.restart,
    )
    .await
}

async fn update(
    state: &AppState,
    key: DependentKey,
    edit: ContentEdit,
    restart: Option<bool>,
) -> Result<Json<DependentUpdateResponse>, AppError> {
    let update = state
        .lifecycle
        .update_dependent(&key, &edit, restart)
        .await?;
    Ok(Json(DependentUpdateResponse {
        data: update.dependent.data,
        restarted: update.restarted,
    }))
}

/// `unbind: true` in the optional body cascades the delete through every binding.
#[instrument(skip(state, principal, payload), fields(user = %principal.0, kind = %kind))]
pub async fn delete_dependent(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, name)): Path<(String, String)>,
    OptionalJson(payload): OptionalJson<DependentDeleteRequest>,
) -> Result<Json<DependentDeleteResponse>, AppError> {
    let key = DependentKey::new(kind, namespace, name);
    let bound_apps = state
        .lifecycle
        .delete_dependent(&key, payload.unbind)
        .await?;
    Ok(Json(DependentDeleteResponse { bound_apps }))
}
