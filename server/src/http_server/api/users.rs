use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    Json,
};
use db::{
    subscriptions::Subscription,
    users::{NewUser, User},
};
use serde::{Deserialize, Serialize};

use crate::{
    http_server::{
        current_user::{CurrentUser, MaybeUser},
        errors::{OptionExt as _, ServerError},
        extract::{ApiJson, ObjectId},
        pagination::{request_url, Page, Pagination},
        representations::{SubscriptionView, UserView},
        validation::{check_text, require, ValidationErrors},
        ResponseResult,
    },
    formats::{is_valid_email, is_valid_username},
    passwords, AppState,
};

const MAX_EMAIL_CHARS: usize = 254;
const MAX_NAME_CHARS: usize = 150;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscriptionsQuery {
    page: Option<String>,
    limit: Option<String>,
    recipes_limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeQuery {
    recipes_limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignUp {
    email: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatedUser {
    email: String,
    id: i64,
    username: String,
    first_name: String,
    last_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetPassword {
    new_password: Option<String>,
    current_password: Option<String>,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn list(
    viewer: MaybeUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    uri: Uri,
) -> ResponseResult<Json<Page<UserView>>> {
    let pagination = Pagination::from_params(
        query.page.as_deref(),
        query.limit.as_deref(),
        state.app.page_size,
    )?;

    let count = User::count(state.db()).await?;
    let users = User::list(state.db(), pagination.limit(), pagination.offset()).await?;
    let views = UserView::many(&state, viewer.id(), &users).await?;

    Ok(Json(pagination.into_page(
        count,
        views,
        &request_url(&state.app.base_url, &uri),
    )?))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn create(
    State(state): State<AppState>,
    ApiJson(sign_up): ApiJson<SignUp>,
) -> ResponseResult<(StatusCode, Json<CreatedUser>)> {
    let new_user = validate_sign_up(&state, sign_up).await?;

    let user = User::create(state.db(), new_user).await?;
    tracing::info!(user.id = user.id, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}

#[tracing::instrument(skip_all, fields(user.id = id))]
pub(crate) async fn get(
    viewer: MaybeUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<Json<UserView>> {
    let user = User::get_by_id(state.db(), id).await?.or_not_found()?;

    Ok(Json(UserView::one(&state, viewer.id(), &user).await?))
}

pub(crate) async fn me(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> ResponseResult<Json<UserView>> {
    Ok(Json(UserView::one(&state, Some(user.id), &user).await?))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn set_password(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SetPassword>,
) -> ResponseResult<StatusCode> {
    let mut errors = ValidationErrors::new();
    let new_password = require(&mut errors, "new_password", body.new_password.as_ref());
    let current_password = require(&mut errors, "current_password", body.current_password.as_ref());
    let (Some(new_password), Some(current_password)) = (new_password, current_password) else {
        return Err(ServerError::Invalid(errors));
    };

    if !passwords::verify_password(current_password, &user.password_hash)? {
        errors.add("current_password", "Invalid password.");
    }
    for problem in passwords::password_problems(new_password, &user.username, &user.email) {
        errors.add("new_password", problem);
    }
    errors.into_result()?;

    user.set_password_hash(state.db(), passwords::hash_password(new_password)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all, fields(author.id = id))]
pub(crate) async fn subscribe(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
    Query(query): Query<SubscribeQuery>,
) -> ResponseResult<(StatusCode, Json<SubscriptionView>)> {
    let author = User::get_by_id(state.db(), id).await?.or_not_found()?;
    let recipes_limit = parse_recipes_limit(query.recipes_limit.as_deref())?;

    if author.id == user.id {
        return Err(ServerError::rejected("You cannot subscribe to yourself."));
    }
    if !Subscription::create(state.db(), user.id, author.id).await? {
        return Err(ServerError::rejected(
            "You are already subscribed to this user.",
        ));
    }

    let mut views =
        SubscriptionView::many(&state, std::slice::from_ref(&author), recipes_limit).await?;
    let view = views.pop().or_not_found()?;

    Ok((StatusCode::CREATED, Json(view)))
}

#[tracing::instrument(skip_all, fields(author.id = id))]
pub(crate) async fn unsubscribe(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    ObjectId(id): ObjectId,
) -> ResponseResult<StatusCode> {
    let author = User::get_by_id(state.db(), id).await?.or_not_found()?;

    if !Subscription::delete(state.db(), user.id, author.id).await? {
        return Err(ServerError::not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub(crate) async fn subscriptions(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<SubscriptionsQuery>,
    uri: Uri,
) -> ResponseResult<Json<Page<SubscriptionView>>> {
    let pagination = Pagination::from_params(
        query.page.as_deref(),
        query.limit.as_deref(),
        state.app.page_size,
    )?;
    let recipes_limit = parse_recipes_limit(query.recipes_limit.as_deref())?;

    let count = Subscription::count_for(state.db(), user.id).await?;
    let authors =
        Subscription::authors_for(state.db(), user.id, pagination.limit(), pagination.offset())
            .await?;
    let views = SubscriptionView::many(&state, &authors, recipes_limit).await?;

    Ok(Json(pagination.into_page(
        count,
        views,
        &request_url(&state.app.base_url, &uri),
    )?))
}

/// An empty `recipes_limit` means no limit.
fn parse_recipes_limit(raw: Option<&str>) -> Result<Option<i64>, ServerError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<i64>() {
        Ok(limit) if limit >= 0 => Ok(Some(limit)),
        Ok(_) => Err(ServerError::Invalid(ValidationErrors::single(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0.",
        ))),
        Err(_) => Err(ServerError::Invalid(ValidationErrors::single(
            "recipes_limit",
            "A valid integer is required.",
        ))),
    }
}

/// Field checks that don't need the database.
fn check_sign_up(sign_up: &SignUp) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if let Some(email) = require(&mut errors, "email", sign_up.email.as_ref()) {
        check_text(&mut errors, "email", email, MAX_EMAIL_CHARS);
        if !email.trim().is_empty() && !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }

    if let Some(username) = require(&mut errors, "username", sign_up.username.as_ref()) {
        check_text(&mut errors, "username", username, MAX_NAME_CHARS);
        if !username.is_empty() && !is_valid_username(username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }

    for (field, value) in [
        ("first_name", &sign_up.first_name),
        ("last_name", &sign_up.last_name),
    ] {
        if let Some(value) = require(&mut errors, field, value.as_ref()) {
            check_text(&mut errors, field, value, MAX_NAME_CHARS);
        }
    }

    if let Some(password) = require(&mut errors, "password", sign_up.password.as_ref()) {
        let username = sign_up.username.as_deref().unwrap_or_default();
        let email = sign_up.email.as_deref().unwrap_or_default();
        for problem in passwords::password_problems(password, username, email) {
            errors.add("password", problem);
        }
    }

    errors
}

async fn validate_sign_up(state: &AppState, sign_up: SignUp) -> ResponseResult<NewUser> {
    let mut errors = check_sign_up(&sign_up);

    let SignUp {
        email: Some(email),
        username: Some(username),
        first_name: Some(first_name),
        last_name: Some(last_name),
        password: Some(password),
    } = sign_up
    else {
        return Err(ServerError::Invalid(errors));
    };

    if User::email_taken(state.db(), &email).await? {
        errors.add("email", "A user with that email already exists.");
    }
    if User::username_taken(state.db(), &username).await? {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    Ok(NewUser {
        email: email.trim().to_string(),
        username,
        first_name,
        last_name,
        password_hash: passwords::hash_password(&password)?,
        is_superuser: false,
    })
}
