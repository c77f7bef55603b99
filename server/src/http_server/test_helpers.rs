use std::path::PathBuf;

use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use db::{
    tokens::AuthToken,
    users::{NewUser, User},
};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tower::ServiceExt as _;
use url::Url;

use crate::{passwords, AppConfig, AppState};

pub(crate) const TEST_PASSWORD: &str = "pastry-chef-42";

pub(crate) fn test_state(pool: PgPool) -> AppState {
    let media_root: PathBuf =
        std::env::temp_dir().join(format!("foodgram-test-media-{}", uuid::Uuid::new_v4()));

    AppState {
        app: AppConfig {
            base_url: Url::parse("http://testserver").unwrap(),
            port: 0,
            media_root,
            page_size: 6,
        },
        db: pool,
    }
}

pub(crate) fn create_test_app(pool: PgPool) -> Router {
    let state = test_state(pool);

    super::routes::make_router(&state.app).with_state(state)
}

pub(crate) async fn create_user(pool: &PgPool, username: &str) -> User {
    User::create(
        pool,
        NewUser {
            email: format!("{username}@example.com"),
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "Cook".to_string(),
            password_hash: passwords::hash_password(TEST_PASSWORD).unwrap(),
            is_superuser: false,
        },
    )
    .await
    .unwrap()
}

/// A user plus a token key that authenticates as them.
pub(crate) async fn create_user_with_token(pool: &PgPool, username: &str) -> (User, String) {
    let user = create_user(pool, username).await;
    let token = AuthToken::get_or_create(pool, user.id, &passwords::generate_token_key())
        .await
        .unwrap();

    (user, token.key)
}

pub(crate) fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }

    builder.body(Body::empty()).unwrap()
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

pub(crate) async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub(crate) async fn response_body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

pub(crate) async fn response_body_text(response: Response<Body>) -> String {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body_bytes.to_vec()).unwrap()
}
