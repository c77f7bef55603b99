use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use db::{tokens::AuthToken, users::User};

use super::errors::ServerError;
use crate::AppState;

const SCHEME: &str = "token";

/// The user behind a valid `Authorization: Token <key>` header. Rejects
/// anonymous requests with a 401.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser(pub User);

/// Like [`CurrentUser`] but lets anonymous requests through. A header that
/// names a token we don't know is still a 401.
#[derive(Debug, Clone)]
pub(crate) struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = token_key(&parts.headers)? else {
            return Ok(Self(None));
        };

        let user = AuthToken::find_user(state.db(), key)
            .await?
            .ok_or_else(|| ServerError::invalid_token("Invalid token."))?;

        tracing::Span::current().record("user.id", user.id);

        Ok(Self(Some(user)))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;

        user.map(Self).ok_or_else(ServerError::unauthenticated)
    }
}

/// Pulls the key out of the `Authorization` header. Headers using another
/// scheme are treated as no credentials at all.
fn token_key(headers: &HeaderMap) -> Result<Option<&str>, ServerError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let mut words = value.as_bytes().split(u8::is_ascii_whitespace).filter(|w| !w.is_empty());
    match words.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME.as_bytes()) => {}
        _ => return Ok(None),
    }

    let key = match (words.next(), words.next()) {
        (None, _) => {
            return Err(ServerError::invalid_token(
                "Invalid token header. No credentials provided.",
            ))
        }
        (Some(_), Some(_)) => {
            return Err(ServerError::invalid_token(
                "Invalid token header. Token string should not contain spaces.",
            ))
        }
        (Some(key), None) => key,
    };

    std::str::from_utf8(key).map(Some).map_err(|_| {
        ServerError::invalid_token(
            "Invalid token header. Token string should not contain invalid characters.",
        )
    })
}
