//! Request extractors that reject with [`ApiError`] bodies instead of
//! axum's plain-text rejections.

use crate::errors::{ApiError, ServiceError};
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use tracing::debug;
use validator::Validate;

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                debug!(error = %rejection, "rejected request body");
                ApiError::bad_request("INVALID_REQUEST", "invalid request body")
            })?;
        value
            .validate()
            .map_err(|errors| ApiError::from(ServiceError::Validation(errors)))?;
        Ok(Self(value))
    }
}

/// Single numeric path parameter.
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("INVALID_ID", "invalid id"))?;
        Ok(Self(id))
    }
}
