use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::dto::{Claims, JwtKeys};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::{Role, User};

/// Extracts and validates the bearer token, returning the raw claims.
/// No store access; use [`CurrentUser`] when the handler needs the record.
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Invalid auth scheme".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(AuthUser(claims))
    }
}

/// Verifies the token, then re-reads the user from the store. Every request
/// goes back to the store; verification results are never cached, so a role
/// change or deletion takes effect on the next call.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        let user = User::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token references a missing user");
                ApiError::Unauthorized("User no longer exists".into())
            })?;
        Ok(CurrentUser(user))
    }
}

/// Role gate for recipe write paths: cook or admin.
pub struct RequireCook(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireCook {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !matches!(user.role, Role::Cook | Role::Admin) {
            warn!(user_id = %user.id, role = %user.role, "role not permitted");
            return Err(ApiError::Forbidden);
        }
        Ok(RequireCook(user))
    }
}

/// Role gate for admin-only routes.
pub struct RequireAdmin(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            warn!(user_id = %user.id, role = %user.role, "admin route denied");
            return Err(ApiError::Forbidden);
        }
        Ok(RequireAdmin(user))
    }
}
