use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use super::{
    api::{auth, ingredients, recipes, tags, users},
    errors::ServerError,
};
use crate::{AppConfig, AppState};

pub(crate) fn make_router(config: &AppConfig) -> Router<AppState> {
    Router::new()
        .route("/api/auth/token/login/", post(auth::login))
        .route("/api/auth/token/logout/", post(auth::logout))
        .route("/api/users/", get(users::list).post(users::create))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/{id}/", get(users::get))
        .route(
            "/api/users/{id}/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/tags/", get(tags::list))
        .route("/api/tags/{id}/", get(tags::get))
        .route("/api/ingredients/", get(ingredients::list))
        .route("/api/ingredients/{id}/", get(ingredients::get))
        .route("/api/recipes/", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/{id}/",
            get(recipes::get)
                .patch(recipes::update)
                .delete(recipes::delete),
        )
        .route(
            "/api/recipes/{id}/favorite/",
            post(recipes::favorite).delete(recipes::unfavorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart/",
            post(recipes::add_to_shopping_cart).delete(recipes::remove_from_shopping_cart),
        )
        .nest_service("/media", ServeDir::new(&config.media_root))
        .fallback(fallback)
}

async fn fallback() -> ServerError {
    ServerError::not_found()
}
