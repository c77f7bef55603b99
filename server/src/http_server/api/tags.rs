use axum::{extract::State, Json};
use db::tags::Tag;

use crate::{
    http_server::{errors::OptionExt as _, extract::ObjectId, ResponseResult},
    AppState,
};

pub(crate) async fn list(State(state): State<AppState>) -> ResponseResult<Json<Vec<Tag>>> {
    Ok(Json(Tag::list_all(state.db()).await?))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<Json<Tag>> {
    Ok(Json(Tag::get_by_id(state.db(), id).await?.or_not_found()?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use db::tags::NewTag;
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use super::*;
    use crate::http_server::test_helpers::{create_test_app, request, response_body_json, send};

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_tags_are_listed_without_pagination(pool: PgPool) {
        Tag::insert_many(
            &pool,
            &[
                NewTag {
                    name: "Breakfast".to_string(),
                    color: "#E26C2D".to_string(),
                    slug: "breakfast".to_string(),
                },
                NewTag {
                    name: "Dinner".to_string(),
                    color: "#8775D2".to_string(),
                    slug: "dinner".to_string(),
                },
            ],
        )
        .await
        .unwrap();
        let app = create_test_app(pool);

        let response = send(&app, request(Method::GET, "/api/tags/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response_body_json(response).await;
        let tags = body.as_array().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["slug"], "breakfast");

        let id = tags[1]["id"].as_i64().unwrap();
        let response = send(&app, request(Method::GET, &format!("/api/tags/{id}/"), None)).await;
        let body: Value = response_body_json(response).await;
        assert_eq!(
            body,
            json!({ "id": id, "name": "Dinner", "color": "#8775D2", "slug": "dinner" })
        );
    }

    #[sqlx::test(migrations = "../db/migrations")]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_missing_tag_is_not_found(pool: PgPool) {
        let app = create_test_app(pool);

        for uri in ["/api/tags/42/", "/api/tags/lunch/"] {
            let response = send(&app, request(Method::GET, uri, None)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
