use std::collections::HashSet;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::Query;
use db::{
    ingredients::Ingredient,
    recipe_lists::{RecipeList, ShoppingListItem},
    recipes::{IngredientAmount, NewRecipe, Recipe, RecipeChanges, RecipeFilter},
    tags::Tag,
    users::User,
};
use itertools::Itertools;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    http_server::{
        current_user::{CurrentUser, MaybeUser},
        errors::{OptionExt as _, ServerError},
        extract::{parse_json, ApiJson, ObjectId},
        pagination::{request_url, Page, Pagination},
        representations::{RecipeMinified, RecipeView},
        validation::{check_text, require, ValidationErrors, REQUIRED},
        ResponseResult,
    },
    images::DecodedImage,
    AppState,
};

const MAX_NAME_CHARS: usize = 200;
const COOKING_TIME_RANGE: (i64, i64) = (1, 1440);
const AMOUNT_RANGE: (i64, i64) = (1, 10_000);
const SHOPPING_LIST_FILE: &str = "shopping_list.txt";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecipeListQuery {
    page: Option<String>,
    limit: Option<String>,
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    is_favorited: Option<String>,
    is_in_shopping_cart: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IngredientPayload {
    id: i64,
    amount: Value,
}

/// Body of a create or edit. Every field is optional here so that missing
/// ones can be reported next to the other field errors.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecipePayload {
    ingredients: Option<Vec<IngredientPayload>>,
    tags: Option<Vec<i64>>,
    image: Option<String>,
    name: Option<String>,
    text: Option<String>,
    cooking_time: Option<Value>,
}

/// A payload that passed the field checks.
#[derive(Debug)]
struct CheckedRecipe {
    name: Option<String>,
    text: Option<String>,
    cooking_time: Option<i16>,
    image: Option<DecodedImage>,
    tag_ids: Vec<i64>,
    ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Edit,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn list(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Query(query): Query<RecipeListQuery>,
    uri: Uri,
) -> ResponseResult<Json<Page<RecipeView>>> {
    let pagination = Pagination::from_params(
        query.page.as_deref(),
        query.limit.as_deref(),
        state.app.page_size,
    )?;
    let filter = recipe_filter(&query, viewer.id())?;

    let (recipes, count) = Recipe::list(
        state.db(),
        &filter,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let views = RecipeView::many(&state, viewer.id(), recipes).await?;

    Ok(Json(pagination.into_page(
        count,
        views,
        &request_url(&state.app.base_url, &uri),
    )?))
}

#[tracing::instrument(skip_all, fields(recipe.id = id))]
pub(crate) async fn get(
    viewer: MaybeUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<Json<RecipeView>> {
    let recipe = Recipe::get_by_id(state.db(), id).await?.or_not_found()?;

    Ok(Json(RecipeView::one(&state, viewer.id(), recipe).await?))
}

#[tracing::instrument(skip_all, fields(user.id = user.id))]
pub(crate) async fn create(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> ResponseResult<(StatusCode, Json<RecipeView>)> {
    let checked = validate(&state, payload, Mode::Create).await?;
    let (Some(name), Some(text), Some(cooking_time), Some(image)) = (
        checked.name,
        checked.text,
        checked.cooking_time,
        checked.image,
    ) else {
        return Err(ServerError::Invalid(ValidationErrors::single(
            "non_field_errors",
            REQUIRED,
        )));
    };

    let image_path = image.store(&state.app.media_root).await?;
    let created = Recipe::create(
        state.db(),
        user.id,
        NewRecipe {
            name,
            image: image_path.clone(),
            text,
            cooking_time,
            tag_ids: checked.tag_ids,
            ingredients: checked.ingredients,
        },
    )
    .await;

    let recipe = match created {
        Ok(recipe) => recipe,
        Err(err) => {
            discard_image(&state, &image_path).await;
            return Err(err.into());
        }
    };
    tracing::info!(recipe.id = recipe.id, "Created recipe");

    Ok((
        StatusCode::CREATED,
        Json(RecipeView::one(&state, Some(user.id), recipe).await?),
    ))
}

/// The body is parsed only after the recipe is found and the user may edit it.
#[tracing::instrument(skip_all, fields(recipe.id = id, user.id = user.id))]
pub(crate) async fn update(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
    body: Bytes,
) -> ResponseResult<Json<RecipeView>> {
    let recipe = Recipe::get_by_id(state.db(), id).await?.or_not_found()?;
    ensure_can_edit(&user, &recipe)?;

    let payload: RecipePayload = parse_json(&body)?;
    let checked = validate(&state, payload, Mode::Edit).await?;

    let image_path = match &checked.image {
        Some(image) => Some(image.store(&state.app.media_root).await?),
        None => None,
    };
    let updated = recipe
        .update(
            state.db(),
            RecipeChanges {
                name: checked.name,
                image: image_path.clone(),
                text: checked.text,
                cooking_time: checked.cooking_time,
                tag_ids: checked.tag_ids,
                ingredients: checked.ingredients,
            },
        )
        .await;

    let updated = match updated {
        Ok(updated) => updated,
        Err(err) => {
            if let Some(path) = &image_path {
                discard_image(&state, path).await;
            }
            return Err(err.into());
        }
    };
    if image_path.is_some() && updated.image != recipe.image {
        discard_image(&state, &recipe.image).await;
    }

    Ok(Json(RecipeView::one(&state, Some(user.id), updated).await?))
}

#[tracing::instrument(skip_all, fields(recipe.id = id, user.id = user.id))]
pub(crate) async fn delete(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<StatusCode> {
    let recipe = Recipe::get_by_id(state.db(), id).await?.or_not_found()?;
    ensure_can_edit(&user, &recipe)?;

    recipe.delete(state.db()).await?;
    discard_image(&state, &recipe.image).await;

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn favorite(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<(StatusCode, Json<RecipeMinified>)> {
    add_to_list(&state, RecipeList::Favorites, &user, id).await
}

pub(crate) async fn unfavorite(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<StatusCode> {
    remove_from_list(&state, RecipeList::Favorites, &user, id).await
}

pub(crate) async fn add_to_shopping_cart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<(StatusCode, Json<RecipeMinified>)> {
    add_to_list(&state, RecipeList::ShoppingList, &user, id).await
}

pub(crate) async fn remove_from_shopping_cart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<StatusCode> {
    remove_from_list(&state, RecipeList::ShoppingList, &user, id).await
}

#[tracing::instrument(skip_all, fields(user.id = user.id))]
pub(crate) async fn download_shopping_cart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> ResponseResult<impl IntoResponse> {
    let items = ShoppingListItem::aggregate_for_user(state.db(), user.id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={SHOPPING_LIST_FILE}"),
            ),
        ],
        render_shopping_list(&items),
    ))
}

#[tracing::instrument(skip(state, user), fields(user.id = user.id))]
async fn add_to_list(
    state: &AppState,
    list: RecipeList,
    user: &User,
    recipe_id: i64,
) -> ResponseResult<(StatusCode, Json<RecipeMinified>)> {
    let recipe = Recipe::get_by_id(state.db(), recipe_id)
        .await?
        .or_not_found()?;

    if !list.add(state.db(), user.id, recipe.id).await? {
        return Err(ServerError::rejected(match list {
            RecipeList::Favorites => "The recipe is already in favorites.",
            RecipeList::ShoppingList => "The recipe is already in the shopping cart.",
        }));
    }

    Ok((
        StatusCode::CREATED,
        Json(RecipeMinified::new(&recipe, &state.app)),
    ))
}

async fn remove_from_list(
    state: &AppState,
    list: RecipeList,
    user: &User,
    recipe_id: i64,
) -> ResponseResult<StatusCode> {
    let recipe = Recipe::get_by_id(state.db(), recipe_id)
        .await?
        .or_not_found()?;

    if !list.remove(state.db(), user.id, recipe.id).await? {
        return Err(ServerError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_can_edit(user: &User, recipe: &Recipe) -> Result<(), ServerError> {
    if recipe.author_id == user.id || user.is_superuser {
        Ok(())
    } else {
        Err(ServerError::forbidden())
    }
}

async fn discard_image(state: &AppState, relative_path: &str) {
    let path = state.app.media_root.join(relative_path);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        tracing::warn!(error = %err, path = %path.display(), "Could not remove recipe image");
    }
}

fn recipe_filter(query: &RecipeListQuery, viewer: Option<i64>) -> Result<RecipeFilter, ServerError> {
    let author_id = match query.author.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(author) => Some(author.parse::<i64>().map_err(|_| {
            ServerError::Invalid(ValidationErrors::single(
                "author",
                "A valid integer is required.",
            ))
        })?),
    };

    let viewer_filter = |flag: Option<&str>| viewer.filter(|_| is_truthy(flag));

    Ok(RecipeFilter {
        author_id,
        tag_slugs: query
            .tags
            .iter()
            .map(|slug| slug.trim())
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .unique()
            .collect(),
        favorited_by: viewer_filter(query.is_favorited.as_deref()),
        in_shopping_list_of: viewer_filter(query.is_in_shopping_cart.as_deref()),
    })
}

fn is_truthy(flag: Option<&str>) -> bool {
    matches!(
        flag.map(str::trim),
        Some("1" | "true" | "True" | "TRUE" | "yes" | "on")
    )
}

/// Accepts JSON integers and strings holding one, like form input does.
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bounded(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Value,
    (min, max): (i64, i64),
    too_small: &str,
    too_large: &str,
) -> Option<i16> {
    let Some(number) = integer(value) else {
        errors.add(field, "A valid integer is required.");
        return None;
    };

    if number < min {
        errors.add(field, too_small);
        None
    } else if number > max {
        errors.add(field, too_large);
        None
    } else {
        i16::try_from(number).ok()
    }
}

/// Field checks that don't need the database. `Mode::Edit` only requires
/// tags and ingredients.
fn check_payload(payload: RecipePayload, mode: Mode) -> Result<CheckedRecipe, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let required = |errors: &mut ValidationErrors, field: &str, present: bool| {
        if mode == Mode::Create && !present {
            errors.add(field, REQUIRED);
        }
    };

    let name = payload.name.as_deref().map(str::trim);
    required(&mut errors, "name", name.is_some());
    if let Some(name) = name {
        check_text(&mut errors, "name", name, MAX_NAME_CHARS);
    }

    let text = payload.text.as_deref().map(str::trim);
    required(&mut errors, "text", text.is_some());
    if let Some(text) = text {
        check_text(&mut errors, "text", text, usize::MAX);
    }

    required(&mut errors, "cooking_time", payload.cooking_time.is_some());
    let cooking_time = payload.cooking_time.as_ref().and_then(|value| {
        bounded(
            &mut errors,
            "cooking_time",
            value,
            COOKING_TIME_RANGE,
            "Minimum cooking time is 1 minute.",
            "Maximum cooking time is 1440 minutes.",
        )
    });

    required(&mut errors, "image", payload.image.is_some());
    let image = payload
        .image
        .as_deref()
        .and_then(|data_uri| match DecodedImage::from_data_uri(data_uri) {
            Ok(image) => Some(image),
            Err(err) => {
                errors.add("image", err.to_string());
                None
            }
        });

    let mut tag_ids = Vec::new();
    if let Some(tags) = require(&mut errors, "tags", payload.tags.as_ref()) {
        if tags.is_empty() {
            errors.add("tags", "Add at least one tag.");
        } else if !tags.iter().all_unique() {
            errors.add("tags", "Tags must not repeat.");
        }
        tag_ids.clone_from(tags);
    }

    let mut ingredients = Vec::new();
    if let Some(lines) = require(&mut errors, "ingredients", payload.ingredients.as_ref()) {
        if lines.is_empty() {
            errors.add("ingredients", "Add at least one ingredient.");
        } else if !lines.iter().map(|line| line.id).all_unique() {
            errors.add("ingredients", "Ingredients must not repeat.");
        }

        for line in lines {
            let amount = bounded(
                &mut errors,
                "ingredients",
                &line.amount,
                AMOUNT_RANGE,
                "Minimum amount is 1.",
                "Maximum amount is 10000.",
            );
            if let Some(amount) = amount {
                ingredients.push(IngredientAmount {
                    ingredient_id: line.id,
                    amount,
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CheckedRecipe {
        name: name.map(str::to_string),
        text: text.map(str::to_string),
        cooking_time,
        image,
        tag_ids,
        ingredients,
    })
}

/// Field checks, then checks that every referenced tag and ingredient exists.
async fn validate(
    state: &AppState,
    payload: RecipePayload,
    mode: Mode,
) -> ResponseResult<CheckedRecipe> {
    let checked = check_payload(payload, mode).map_err(ServerError::Invalid)?;
    let mut errors = ValidationErrors::new();

    let existing: HashSet<i64> = Tag::existing_ids(state.db(), &checked.tag_ids)
        .await?
        .into_iter()
        .collect();
    for id in checked.tag_ids.iter().filter(|id| !existing.contains(id)) {
        errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
    }

    let ingredient_ids = checked
        .ingredients
        .iter()
        .map(|i| i.ingredient_id)
        .collect_vec();
    let existing: HashSet<i64> = Ingredient::existing_ids(state.db(), &ingredient_ids)
        .await?
        .into_iter()
        .collect();
    for id in ingredient_ids.iter().filter(|id| !existing.contains(id)) {
        errors.add(
            "ingredients",
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }

    errors.into_result()?;

    Ok(checked)
}

fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| format!("{} - {} | {}", item.name, item.measurement_unit, item.amount))
        .join("\n")
}
