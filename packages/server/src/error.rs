use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::lifecycle::LifecycleError;

/// One entry of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorItem {
    /// HTTP status this error maps to.
    pub status: u16,
    /// Human-readable summary.
    pub title: String,
    /// Supplementary context, empty when there is none.
    pub details: String,
}

/// Structured error response returned by all endpoints on failure.
///
/// The response status equals the `status` of the first entry.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorItem>,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    PrincipalMissing,
    NotFound(String),
    Lifecycle(LifecycleError),
    Internal(String),
}

impl AppError {
    fn items(self) -> Vec<ErrorItem> {
        match self {
            AppError::Validation(msg) => vec![item(StatusCode::BAD_REQUEST, msg, String::new())],
            AppError::PrincipalMissing => vec![item(
                StatusCode::UNAUTHORIZED,
                "Authentication required".into(),
                String::new(),
            )],
            AppError::NotFound(msg) => vec![item(StatusCode::NOT_FOUND, msg, String::new())],
            AppError::Lifecycle(err) => lifecycle_items(err),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                vec![internal_item()]
            }
        }
    }
}

fn item(status: StatusCode, title: String, details: String) -> ErrorItem {
    ErrorItem {
        status: status.as_u16(),
        title,
        details,
    }
}

fn internal_item() -> ErrorItem {
    item(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An unexpected error occurred".into(),
        String::new(),
    )
}

fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
        LifecycleError::BlobAppMismatch { .. }
        | LifecycleError::StageAppMismatch { .. }
        | LifecycleError::StageNotSucceeded { .. }
        | LifecycleError::BoundApplicationsExist { .. }
        | LifecycleError::Validation(_)
        | LifecycleError::NotDeployed(_) => StatusCode::BAD_REQUEST,
        LifecycleError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LifecycleError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        LifecycleError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LifecycleError::Multiple(errors) => errors
            .first()
            .map(lifecycle_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Render a lifecycle error as response entries, one per collected failure.
pub fn lifecycle_items(err: LifecycleError) -> Vec<ErrorItem> {
    match err {
        LifecycleError::Multiple(errors) => errors.into_iter().flat_map(lifecycle_items).collect(),
        LifecycleError::Internal(detail) => {
            tracing::error!("Internal error: {}", detail);
            vec![internal_item()]
        }
        LifecycleError::UpstreamUnavailable(ref detail) => {
            tracing::warn!("Upstream unavailable: {}", detail);
            vec![item(lifecycle_status(&err), err.to_string(), String::new())]
        }
        other => vec![item(lifecycle_status(&other), other.to_string(), other.details())],
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let errors = self.items();
        let status = errors
            .first()
            .and_then(|e| StatusCode::from_u16(e.status).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { errors })).into_response()
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        AppError::Lifecycle(err)
    }
}
