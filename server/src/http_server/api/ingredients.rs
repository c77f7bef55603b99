use axum::{
    extract::{Query, State},
    Json,
};
use db::ingredients::Ingredient;
use serde::Deserialize;

use crate::{
    http_server::{errors::OptionExt as _, extract::ObjectId, ResponseResult},
    AppState,
};

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    name: Option<String>,
}

/// Case-insensitive prefix search on `?name=`, unpaginated.
#[tracing::instrument(skip_all, fields(name = query.name.as_deref()))]
pub(crate) async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ResponseResult<Json<Vec<Ingredient>>> {
    let prefix = query.name.as_deref().filter(|n| !n.is_empty());

    Ok(Json(Ingredient::search(state.db(), prefix).await?))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<Json<Ingredient>> {
    Ok(Json(
        Ingredient::get_by_id(state.db(), id).await?.or_not_found()?,
    ))
}
