use super::token::{Claims, TokenService};
use crate::errors::ApiError;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use shop_models::UserRole;
use std::sync::Arc;
use tracing::debug;

/// Caller identity taken from a valid bearer token. Admits every role.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Caller identity that passed the admin role gate.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
        let tokens = Arc::<TokenService>::from_ref(state);
        let claims = tokens.verify(token).map_err(|err| {
            debug!(error = %err, "rejected bearer token");
            ApiError::unauthorized("Invalid authentication provided")
        })?;
        Ok(AuthUser(claims))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.has_role(&[UserRole::Admin]) {
            return Err(ApiError::forbidden(
                "You are not allowed to perform this action",
            ));
        }
        Ok(AdminUser(claims))
    }
}
