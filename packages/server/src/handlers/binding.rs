use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use common::AppRef;
use tracing::instrument;

use crate::domain::DependentKind;
use crate::error::AppError;
use crate::extractors::json::AppJson;
use crate::extractors::principal::Principal;
use crate::models::dependent::{BindRequest, BindResponse};
use crate::state::AppState;

/// Bind configurations or services (per the routed kind) to an application.
#[instrument(skip(state, principal, payload), fields(user = %principal.0, kind = %kind))]
pub async fn bind(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, app)): Path<(String, String)>,
    AppJson(payload): AppJson<BindRequest>,
) -> Result<Json<BindResponse>, AppError> {
    let was_bound = state
        .lifecycle
        .bind(&AppRef::new(namespace, app), kind, &payload.names)
        .await?;
    Ok(Json(BindResponse { was_bound }))
}

#[instrument(skip(state, principal), fields(user = %principal.0, kind = %kind))]
pub async fn unbind(
    principal: Principal,
    State(state): State<AppState>,
    Extension(kind): Extension<DependentKind>,
    Path((namespace, app, name)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .lifecycle
        .unbind(&AppRef::new(namespace, app), kind, &name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
