use axum::{extract::State, http::StatusCode, Json};
use db::{tokens::AuthToken, users::User};
use serde::{Deserialize, Serialize};

use crate::{
    http_server::{
        current_user::CurrentUser,
        errors::ServerError,
        extract::ApiJson,
        validation::{require, ValidationErrors},
        ResponseResult,
    },
    passwords, AppState,
};

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    auth_token: String,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ResponseResult<Json<LoginResponse>> {
    let mut errors = ValidationErrors::new();
    let email = require(&mut errors, "email", body.email.as_ref());
    let password = require(&mut errors, "password", body.password.as_ref());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(ServerError::Invalid(errors));
    };

    let Some(user) = User::get_by_email(state.db(), email).await? else {
        return Err(bad_credentials());
    };
    if !passwords::verify_password(password, &user.password_hash)? {
        return Err(bad_credentials());
    }

    let token =
        AuthToken::get_or_create(state.db(), user.id, &passwords::generate_token_key()).await?;
    tracing::info!(user.id = user.id, "Issued auth token");

    Ok(Json(LoginResponse {
        auth_token: token.key,
    }))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ResponseResult<StatusCode> {
    AuthToken::delete_for_user(state.db(), user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn bad_credentials() -> ServerError {
    ServerError::Invalid(ValidationErrors::single("non_field_errors", BAD_CREDENTIALS))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use super::*;
    use crate::http_server::test_helpers::{
        create_test_app, create_user, json_request, request, response_body_json, send,
        TEST_PASSWORD,
    };

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_login_returns_a_stable_token(pool: PgPool) {
        let app = create_test_app(pool.clone());
        create_user(&pool, "julia").await;
        let credentials = json!({ "email": "julia@example.com", "password": TEST_PASSWORD });

        let response = send(
            &app,
            json_request(Method::POST, "/api/auth/token/login/", None, &credentials),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let first: Value = response_body_json(response).await;
        let key = first["auth_token"].as_str().unwrap().to_string();
        assert_eq!(key.len(), 40);

        let response = send(
            &app,
            json_request(Method::POST, "/api/auth/token/login/", None, &credentials),
        )
        .await;
        let second: Value = response_body_json(response).await;
        assert_eq!(second["auth_token"], key.as_str());

        let response = send(&app, request(Method::GET, "/api/users/me/", Some(&key))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_login_with_wrong_password(pool: PgPool) {
        let app = create_test_app(pool.clone());
        create_user(&pool, "julia").await;

        let response = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/token/login/",
                None,
                &json!({ "email": "julia@example.com", "password": "nope-nope-nope" }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response_body_json(response).await;
        assert_eq!(body, json!({ "non_field_errors": [BAD_CREDENTIALS] }));
    }

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_login_requires_both_fields(pool: PgPool) {
        let app = create_test_app(pool);

        let response = send(
            &app,
            json_request(Method::POST, "/api/auth/token/login/", None, &json!({})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = response_body_json(response).await;
        assert_eq!(body["email"][0], "This field is required.");
        assert_eq!(body["password"][0], "This field is required.");
    }

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_logout_revokes_the_token(pool: PgPool) {
        let app = create_test_app(pool.clone());
        let (_, token) =
            crate::http_server::test_helpers::create_user_with_token(&pool, "julia").await;

        let response = send(
            &app,
            request(Method::POST, "/api/auth/token/logout/", Some(&token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, request(Method::GET, "/api/users/me/", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response_body_json(response).await;
        assert_eq!(body, json!({ "detail": "Invalid token." }));
    }

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_logout_requires_authentication(pool: PgPool) {
        let app = create_test_app(pool);

        let response = send(&app, request(Method::POST, "/api/auth/token/logout/", None)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
