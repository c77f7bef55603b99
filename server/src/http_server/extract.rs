use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::{errors::ServerError, validation::ValidationErrors};

/// JSON body whose parse failures render as a field error map.
#[derive(Debug)]
pub(crate) struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ServerError::Invalid(ValidationErrors::single(
                "non_field_errors",
                rejection.body_text(),
            ))),
        }
    }
}

/// Parses a raw body once the handler is ready to look at it.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServerError> {
    serde_json::from_slice(body).map_err(|e| {
        ServerError::Invalid(ValidationErrors::single(
            "non_field_errors",
            format!("JSON parse error - {e}"),
        ))
    })
}

/// Numeric `{id}` path segment. Anything unparsable is simply not found.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectId(pub i64);

impl<S> FromRequestParts<S> for ObjectId
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| ServerError::not_found())?;

        Ok(Self(id))
    }
}
