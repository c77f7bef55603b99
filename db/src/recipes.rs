use std::collections::HashMap;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    /// Path relative to the media root.
    pub image: String,
    pub text: String,
    pub cooking_time: i16, // minutes
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub ingredient_id: i64,
    pub amount: i16,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i16,
    pub tag_ids: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

/// An edit to an existing recipe. Scalar fields left as `None` keep their
/// current value; tags and ingredients always replace the existing sets.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i16>,
    pub tag_ids: Vec<i64>,
    pub ingredients: Vec<IngredientAmount>,
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i64>,
    pub tag_slugs: Vec<String>,
    pub favorited_by: Option<i64>,
    pub in_shopping_list_of: Option<i64>,
}

/// An ingredient line of a recipe, joined with the ingredient it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RecipeIngredient {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date";

impl Recipe {
    #[tracing::instrument(skip(pool, recipe), fields(name = %recipe.name), err)]
    pub async fn create(pool: &PgPool, author_id: i64, recipe: NewRecipe) -> Result<Self> {
        let mut transaction = pool.begin().await?;

        let created = sqlx::query_as::<_, Recipe>(&format!(
            r"
            INSERT INTO recipes AS r (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RECIPE_COLUMNS}
            "
        ))
        .bind(author_id)
        .bind(recipe.name)
        .bind(recipe.image)
        .bind(recipe.text)
        .bind(recipe.cooking_time)
        .fetch_one(&mut *transaction)
        .await?;

        insert_associations(
            &mut transaction,
            created.id,
            &recipe.tag_ids,
            &recipe.ingredients,
        )
        .await?;

        transaction.commit().await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self, pool, changes), fields(recipe_id = self.id), err)]
    pub async fn update(&self, pool: &PgPool, changes: RecipeChanges) -> Result<Self> {
        let mut transaction = pool.begin().await?;

        let updated = sqlx::query_as::<_, Recipe>(&format!(
            r"
            UPDATE recipes AS r
            SET name = COALESCE($2, r.name),
                image = COALESCE($3, r.image),
                text = COALESCE($4, r.text),
                cooking_time = COALESCE($5, r.cooking_time)
            WHERE r.id = $1
            RETURNING {RECIPE_COLUMNS}
            "
        ))
        .bind(self.id)
        .bind(changes.name)
        .bind(changes.image)
        .bind(changes.text)
        .bind(changes.cooking_time)
        .fetch_one(&mut *transaction)
        .await?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(self.id)
            .execute(&mut *transaction)
            .await?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(self.id)
            .execute(&mut *transaction)
            .await?;

        insert_associations(
            &mut transaction,
            self.id,
            &changes.tag_ids,
            &changes.ingredients,
        )
        .await?;

        transaction.commit().await?;

        Ok(updated)
    }

    #[tracing::instrument(skip(self, pool), fields(recipe_id = self.id), err)]
    pub async fn delete(&self, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(self.id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(recipe)
    }

    /// One page of recipes matching `filter`, newest first, plus the total
    /// number of matches.
    pub async fn list(
        pool: &PgPool,
        filter: &RecipeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64)> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        push_filters(&mut count_query, filter);
        let count: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query =
            QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE TRUE"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let recipes = query.build_query_as::<Recipe>().fetch_all(pool).await?;

        Ok((recipes, count))
    }

    /// Recipes by any of `author_ids`, newest first within each author.
    /// `per_author` caps how many come back for each author; `None` returns
    /// all of them.
    pub async fn latest_by_authors(
        pool: &PgPool,
        author_ids: &[i64],
        per_author: Option<i64>,
    ) -> Result<Vec<Self>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            r"
            SELECT {RECIPE_COLUMNS}
            FROM (
                SELECT recipes.*,
                    ROW_NUMBER() OVER (
                        PARTITION BY author_id ORDER BY pub_date DESC, id DESC
                    ) AS author_rank
                FROM recipes
                WHERE author_id = ANY($1)
            ) r
            WHERE $2::BIGINT IS NULL OR r.author_rank <= $2
            ORDER BY r.author_id, r.pub_date DESC, r.id DESC
            "
        ))
        .bind(author_ids)
        .bind(per_author)
        .fetch_all(pool)
        .await?;

        Ok(recipes)
    }

    /// Number of recipes per author. Authors without recipes are absent.
    pub async fn count_by_authors(pool: &PgPool, author_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
        )
        .bind(author_ids)
        .fetch_all(pool)
        .await?;

        Ok(counts.into_iter().collect())
    }
}

impl RecipeIngredient {
    pub async fn for_recipes(pool: &PgPool, recipe_ids: &[i64]) -> Result<Vec<Self>> {
        let ingredients = sqlx::query_as::<_, RecipeIngredient>(
            r"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            ",
        )
        .bind(recipe_ids)
        .fetch_all(pool)
        .await?;

        Ok(ingredients)
    }
}

async fn insert_associations(
    conn: &mut PgConnection,
    recipe_id: i64,
    tag_ids: &[i64],
    ingredients: &[IngredientAmount],
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, tag_id FROM UNNEST($2::bigint[]) AS tag_id
        ",
    )
    .bind(recipe_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await?;

    let ingredient_ids: Vec<i64> = ingredients.iter().map(|i| i.ingredient_id).collect();
    let amounts: Vec<i16> = ingredients.iter().map(|i| i.amount).collect();

    sqlx::query(
        r"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, ingredient_id, amount
        FROM UNNEST($2::bigint[], $3::smallint[]) AS t (ingredient_id, amount)
        ",
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    if let Some(author_id) = filter.author_id {
        query.push(" AND r.author_id = ").push_bind(author_id);
    }

    if !filter.tag_slugs.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tag_slugs.clone())
            .push("))");
    }

    if let Some(user_id) = filter.favorited_by {
        query
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }

    if let Some(user_id) = filter.in_shopping_list_of {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM shopping_list s WHERE s.recipe_id = r.id AND s.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
    }
}
