use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header the upstream authentication layer sets to the authenticated user name.
pub const PRINCIPAL_HEADER: &str = "x-forwarded-user";

/// The caller, as asserted by the upstream authentication layer.
///
/// Add this as a handler parameter to require an authenticated caller.
#[derive(Debug, Clone)]
pub struct Principal(pub String);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::PrincipalMissing)?;
        Ok(Principal(user.to_string()))
    }
}
