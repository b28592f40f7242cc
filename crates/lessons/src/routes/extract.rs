//! Query extractor that validates before the handler runs

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

/// `Query<T>` that rejects with a 400 `{"detail": …}` body when the query
/// string does not deserialize or fails `T`'s validation rules
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection, "Query string rejected");
                ApiError::BadRequest(rejection.body_text())
            })?;
        params
            .validate()
            .map_err(|e| ApiError::BadRequest(format!("Invalid query parameter: {e}")))?;
        Ok(Self(params))
    }
}
