use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::validation::ValidationErrors;

/// Everything a handler can fail with, rendered the way API clients expect:
/// field maps for invalid input, `{"detail": ..}` for auth and lookups,
/// `{"errors": ..}` for rejected list and subscription changes.
#[derive(Debug)]
pub enum ServerError {
    Invalid(ValidationErrors),
    Detail(StatusCode, String),
    Errors(String),
    Internal(color_eyre::Report),
}

impl ServerError {
    pub fn not_found() -> Self {
        Self::Detail(StatusCode::NOT_FOUND, "Not found.".to_string())
    }

    pub fn unauthenticated() -> Self {
        Self::Detail(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.".to_string(),
        )
    }

    pub fn invalid_token(detail: &str) -> Self {
        Self::Detail(StatusCode::UNAUTHORIZED, detail.to_string())
    }

    pub fn forbidden() -> Self {
        Self::Detail(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.".to_string(),
        )
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Errors(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) | Self::Errors(_) => StatusCode::BAD_REQUEST,
            Self::Detail(status, _) => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<E> From<E> for ServerError
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            Self::Invalid(errors) => (status, Json(errors)).into_response(),
            Self::Detail(status, detail) if status == StatusCode::UNAUTHORIZED => (
                status,
                [(header::WWW_AUTHENTICATE, "Token")],
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            Self::Detail(status, detail) => (status, Json(json!({ "detail": detail }))).into_response(),
            Self::Errors(message) => (status, Json(json!({ "errors": message }))).into_response(),
            Self::Internal(report) => {
                tracing::error!(error = ?report, "ServerError");

                (
                    status,
                    Json(json!({ "detail": "A server error occurred." })),
                )
                    .into_response()
            }
        }
    }
}

pub(crate) trait OptionExt<T> {
    /// Turns a missing row into a 404.
    fn or_not_found(self) -> Result<T, ServerError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self) -> Result<T, ServerError> {
        self.ok_or_else(ServerError::not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::eyre;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_renders_detail() {
        let response = ServerError::not_found().into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "detail": "Not found." }));
    }

    #[tokio::test]
    async fn test_unauthenticated_asks_for_a_token() {
        let response = ServerError::unauthenticated().into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Token"
        );
    }

    #[tokio::test]
    async fn test_internal_errors_hide_the_report() {
        let err: ServerError = eyre!("connection refused on 10.0.0.3").into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "A server error occurred." })
        );
    }

    #[tokio::test]
    async fn test_rejected_renders_errors_key() {
        let response = ServerError::rejected("Already subscribed.").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "errors": "Already subscribed." })
        );
    }

    #[test]
    fn test_or_not_found() {
        assert_eq!(Some(3).or_not_found().unwrap(), 3);
        assert_eq!(
            None::<i32>.or_not_found().unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }
}
