//! Bearer-token extractor for protected routes.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use super::error::AppError;
use super::state::AppState;
use crate::models::user::{Role, User};
use crate::services::auth;

/// The authenticated acting user, resolved from the `Authorization` header.
///
/// Extracting this verifies the token and re-checks `is_active` against the
/// repository; handlers then call [`AuthUser::require`] for role gating.
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    /// Enforce the role policy for a mutating operation.
    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        auth::authorize(&self.user, roles).map_err(AppError::from)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Expected a bearer token".to_string()))?;

        let user = auth::authenticate(state.repository.as_ref(), &state.auth, token).await?;
        Ok(AuthUser { user })
    }
}
