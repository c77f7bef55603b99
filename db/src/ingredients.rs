use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    /// Lists ingredients, optionally restricted to names starting with `prefix`
    /// (case-insensitive).
    pub async fn search(pool: &PgPool, prefix: Option<&str>) -> Result<Vec<Self>> {
        let pattern = prefix.map(|p| format!("{}%", escape_like(p)));

        let ingredients = sqlx::query_as::<_, Ingredient>(
            r"
            SELECT id, name, measurement_unit
            FROM ingredients
            WHERE $1::text IS NULL OR name ILIKE $1
            ORDER BY name, measurement_unit
            ",
        )
        .bind(pattern)
        .fetch_all(pool)
        .await?;

        Ok(ingredients)
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(ingredient)
    }

    /// Which of `ids` refer to existing ingredients.
    pub async fn existing_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<i64>> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;

        Ok(found)
    }

    #[tracing::instrument(skip(pool, ingredients), fields(count = ingredients.len()), err)]
    pub async fn insert_many(pool: &PgPool, ingredients: &[NewIngredient]) -> Result<u64> {
        let names: Vec<&str> = ingredients.iter().map(|i| i.name.as_str()).collect();
        let units: Vec<&str> = ingredients
            .iter()
            .map(|i| i.measurement_unit.as_str())
            .collect();

        let result = sqlx::query(
            r"
            INSERT INTO ingredients (name, measurement_unit)
            SELECT * FROM UNNEST($1::text[], $2::text[])
            ON CONFLICT (name, measurement_unit) DO NOTHING
            ",
        )
        .bind(&names)
        .bind(&units)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("salt"), "salt");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    fn new(name: &str, unit: &str) -> NewIngredient {
        NewIngredient {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_search_by_prefix_is_case_insensitive(pool: PgPool) {
        Ingredient::insert_many(
            &pool,
            &[new("sugar", "g"), new("salt", "g"), new("butter", "g")],
        )
        .await
        .unwrap();

        let found = Ingredient::search(&pool, Some("S")).await.unwrap();
        assert_eq!(
            found.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["salt", "sugar"]
        );

        let all = Ingredient::search(&pool, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_insert_many_skips_existing_pairs(pool: PgPool) {
        let inserted = Ingredient::insert_many(&pool, &[new("milk", "ml"), new("milk", "l")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let inserted = Ingredient::insert_many(&pool, &[new("milk", "ml"), new("eggs", "pcs")])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
    }
}
