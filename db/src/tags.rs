use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// A tag together with the recipe it is attached to.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeTag {
    pub recipe_id: i64,
    #[sqlx(flatten)]
    pub tag: Tag,
}

impl Tag {
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags ORDER BY id")
            .fetch_all(pool)
            .await?;

        Ok(tags)
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(tag)
    }

    /// Which of `ids` refer to existing tags.
    pub async fn existing_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;

        Ok(found)
    }

    /// Inserts tags, skipping any that collide with an existing name, color or slug.
    #[tracing::instrument(skip(pool, tags), fields(count = tags.len()), err)]
    pub async fn insert_many(pool: &PgPool, tags: &[NewTag]) -> Result<u64> {
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        let colors: Vec<&str> = tags.iter().map(|t| t.color.as_str()).collect();
        let slugs: Vec<&str> = tags.iter().map(|t| t.slug.as_str()).collect();

        let result = sqlx::query(
            r"
            INSERT INTO tags (name, color, slug)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(&names)
        .bind(&colors)
        .bind(&slugs)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl RecipeTag {
    pub async fn for_recipes(pool: &PgPool, recipe_ids: &[i64]) -> Result<Vec<Self>> {
        let tags = sqlx::query_as::<_, RecipeTag>(
            r"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM recipe_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.id
            ",
        )
        .bind(recipe_ids)
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }
}
