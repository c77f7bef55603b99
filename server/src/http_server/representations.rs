//! JSON shapes returned by the API, and the batched lookups that fill in
//! the per-viewer flags.

use std::collections::{HashMap, HashSet};

use color_eyre::eyre::eyre;
use db::{
    recipe_lists::RecipeList,
    recipes::{Recipe, RecipeIngredient},
    subscriptions::Subscription,
    tags::{RecipeTag, Tag},
    users::User,
};
use itertools::Itertools;
use serde::Serialize;

use crate::{AppConfig, AppState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct UserView {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: &User, is_subscribed: bool) -> Self {
        Self {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        }
    }

    /// Views of `users` as seen by `viewer`.
    pub async fn many(
        state: &AppState,
        viewer: Option<i64>,
        users: &[User],
    ) -> color_eyre::Result<Vec<Self>> {
        let ids = users.iter().map(|u| u.id).collect_vec();
        let followed = followed_among(state, viewer, &ids).await?;

        Ok(users
            .iter()
            .map(|user| Self::new(user, followed.contains(&user.id)))
            .collect())
    }

    pub async fn one(
        state: &AppState,
        viewer: Option<i64>,
        user: &User,
    ) -> color_eyre::Result<Self> {
        let followed = followed_among(state, viewer, &[user.id]).await?;

        Ok(Self::new(user, followed.contains(&user.id)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct IngredientLine {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

impl From<RecipeIngredient> for IngredientLine {
    fn from(line: RecipeIngredient) -> Self {
        Self {
            id: line.id,
            name: line.name,
            measurement_unit: line.measurement_unit,
            amount: line.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RecipeView {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<IngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
}

impl RecipeView {
    /// Full views of `recipes` as seen by `viewer`, in the same order.
    /// Runs a fixed number of queries regardless of how many recipes there are.
    #[tracing::instrument(skip_all, fields(recipes = recipes.len()), err)]
    pub async fn many(
        state: &AppState,
        viewer: Option<i64>,
        recipes: Vec<Recipe>,
    ) -> color_eyre::Result<Vec<Self>> {
        let db = state.db();
        let recipe_ids = recipes.iter().map(|r| r.id).collect_vec();
        let author_ids = recipes.iter().map(|r| r.author_id).unique().collect_vec();

        let mut tags = RecipeTag::for_recipes(db, &recipe_ids)
            .await?
            .into_iter()
            .into_group_map_by(|t| t.recipe_id);
        let mut ingredients = RecipeIngredient::for_recipes(db, &recipe_ids)
            .await?
            .into_iter()
            .into_group_map_by(|i| i.recipe_id);
        let authors: HashMap<i64, User> = User::get_many(db, &author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let followed = followed_among(state, viewer, &author_ids).await?;
        let (favorited, in_cart) = match viewer {
            Some(user_id) => (
                RecipeList::Favorites
                    .contained(db, user_id, &recipe_ids)
                    .await?,
                RecipeList::ShoppingList
                    .contained(db, user_id, &recipe_ids)
                    .await?,
            ),
            None => (HashSet::new(), HashSet::new()),
        };

        recipes
            .into_iter()
            .map(|recipe| -> color_eyre::Result<Self> {
                let author = authors
                    .get(&recipe.author_id)
                    .ok_or_else(|| eyre!("Recipe {} has no author", recipe.id))?;

                Ok(Self {
                    id: recipe.id,
                    tags: tags
                        .remove(&recipe.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|t| t.tag)
                        .collect(),
                    author: UserView::new(author, followed.contains(&author.id)),
                    ingredients: ingredients
                        .remove(&recipe.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(IngredientLine::from)
                        .collect(),
                    is_favorited: favorited.contains(&recipe.id),
                    is_in_shopping_cart: in_cart.contains(&recipe.id),
                    image: state.app.media_url(&recipe.image),
                    name: recipe.name,
                    text: recipe.text,
                    cooking_time: recipe.cooking_time,
                })
            })
            .collect()
    }

    pub async fn one(
        state: &AppState,
        viewer: Option<i64>,
        recipe: Recipe,
    ) -> color_eyre::Result<Self> {
        Self::many(state, viewer, vec![recipe])
            .await?
            .pop()
            .ok_or_else(|| eyre!("Recipe view went missing"))
    }
}

/// The short form used in list membership responses and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RecipeMinified {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

impl RecipeMinified {
    pub fn new(recipe: &Recipe, config: &AppConfig) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: config.media_url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeMinified>,
    pub recipes_count: i64,
}

impl SubscriptionView {
    /// `authors` are all followed by the viewer. `recipes_limit` caps the
    /// embedded recipe list, not `recipes_count`.
    pub async fn many(
        state: &AppState,
        authors: &[User],
        recipes_limit: Option<i64>,
    ) -> color_eyre::Result<Vec<Self>> {
        let author_ids: Vec<i64> = authors.iter().map(|a| a.id).collect();
        let mut recipes = Recipe::latest_by_authors(state.db(), &author_ids, recipes_limit)
            .await?
            .into_iter()
            .into_group_map_by(|r| r.author_id);
        let counts = Recipe::count_by_authors(state.db(), &author_ids).await?;

        let views = authors
            .iter()
            .map(|author| Self {
                author: UserView::new(author, true),
                recipes: recipes
                    .remove(&author.id)
                    .unwrap_or_default()
                    .iter()
                    .map(|r| RecipeMinified::new(r, &state.app))
                    .collect(),
                recipes_count: counts.get(&author.id).copied().unwrap_or_default(),
            })
            .collect();

        Ok(views)
    }
}

async fn followed_among(
    state: &AppState,
    viewer: Option<i64>,
    author_ids: &[i64],
) -> color_eyre::Result<HashSet<i64>> {
    match viewer {
        Some(user_id) => Subscription::followed_among(state.db(), user_id, author_ids).await,
        None => Ok(HashSet::new()),
    }
}
