use std::collections::HashSet;

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// Per-user lists of recipes. Both are plain `(user_id, recipe_id)` join
/// tables with a uniqueness constraint on the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeList {
    Favorites,
    ShoppingList,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingList => "shopping_list",
        }
    }

    /// Adds the recipe to the user's list. Returns `false` when it was
    /// already there.
    #[tracing::instrument(skip(pool), err)]
    pub async fn add(self, pool: &PgPool, user_id: i64, recipe_id: i64) -> Result<bool> {
        let inserted = sqlx::query_scalar::<_, i64>(&format!(
            r"
            INSERT INTO {} (user_id, recipe_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, recipe_id) DO NOTHING
            RETURNING id
            ",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?;

        Ok(inserted.is_some())
    }

    /// Removes the recipe from the user's list. Returns `false` when it
    /// was not there.
    #[tracing::instrument(skip(pool), err)]
    pub async fn remove(self, pool: &PgPool, user_id: i64, recipe_id: i64) -> Result<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The subset of `recipe_ids` present in the user's list.
    pub async fn contained(
        self,
        pool: &PgPool,
        user_id: i64,
        recipe_ids: &[i64],
    ) -> Result<HashSet<i64>> {
        let found = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            self.table()
        ))
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(pool)
        .await?;

        Ok(found.into_iter().collect())
    }
}

/// One line of a shopping list: the total amount of an ingredient across
/// every recipe in the user's shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl ShoppingListItem {
    #[tracing::instrument(skip(pool), err)]
    pub async fn aggregate_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Self>> {
        let items = sqlx::query_as::<_, ShoppingListItem>(
            r"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::bigint AS amount
            FROM shopping_list s
            JOIN recipe_ingredients ri ON ri.recipe_id = s.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE s.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            ",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredients::{Ingredient, NewIngredient};
    use crate::recipes::test_support::{recipe, stock_pantry};
    use crate::recipes::Recipe;
    use crate::users::test_support::create_user;

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_add_and_remove_report_membership_changes(pool: PgPool) {
        let user = create_user(&pool, "cook").await;
        let pantry = stock_pantry(&pool).await;
        let dish = Recipe::create(
            &pool,
            user.id,
            recipe("Eggs", vec![pantry.tags[0].id], &[(pantry.ingredients[0].id, 2)]),
        )
        .await
        .unwrap();

        for list in [RecipeList::Favorites, RecipeList::ShoppingList] {
            assert!(list.add(&pool, user.id, dish.id).await.unwrap());
            assert!(!list.add(&pool, user.id, dish.id).await.unwrap());

            let contained = list.contained(&pool, user.id, &[dish.id, dish.id + 1]).await.unwrap();
            assert_eq!(contained, HashSet::from([dish.id]));

            assert!(list.remove(&pool, user.id, dish.id).await.unwrap());
            assert!(!list.remove(&pool, user.id, dish.id).await.unwrap());
        }
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_lists_are_independent(pool: PgPool) {
        let user = create_user(&pool, "cook").await;
        let pantry = stock_pantry(&pool).await;
        let dish = Recipe::create(
            &pool,
            user.id,
            recipe("Eggs", vec![pantry.tags[0].id], &[(pantry.ingredients[0].id, 2)]),
        )
        .await
        .unwrap();

        RecipeList::Favorites.add(&pool, user.id, dish.id).await.unwrap();

        let in_cart = RecipeList::ShoppingList
            .contained(&pool, user.id, &[dish.id])
            .await
            .unwrap();
        assert!(in_cart.is_empty());
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_aggregate_sums_amounts_across_recipes(pool: PgPool) {
        let user = create_user(&pool, "cook").await;
        let other = create_user(&pool, "other").await;
        let pantry = stock_pantry(&pool).await;
        let tag = pantry.tags[0].id;
        let eggs = pantry.ingredients[0].id;
        let flour = pantry.ingredients[1].id;
        let milk = pantry.ingredients[2].id;

        let pancakes = Recipe::create(
            &pool,
            user.id,
            recipe("Pancakes", vec![tag], &[(eggs, 2), (flour, 200), (milk, 300)]),
        )
        .await
        .unwrap();
        let omelette = Recipe::create(&pool, user.id, recipe("Omelette", vec![tag], &[(eggs, 3), (milk, 50)]))
            .await
            .unwrap();
        let bread = Recipe::create(&pool, user.id, recipe("Bread", vec![tag], &[(flour, 500)]))
            .await
            .unwrap();

        let cart = RecipeList::ShoppingList;
        cart.add(&pool, user.id, pancakes.id).await.unwrap();
        cart.add(&pool, user.id, omelette.id).await.unwrap();
        cart.add(&pool, other.id, bread.id).await.unwrap();

        let items = ShoppingListItem::aggregate_for_user(&pool, user.id).await.unwrap();

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: "eggs".to_string(),
                    measurement_unit: "pcs".to_string(),
                    amount: 5,
                },
                ShoppingListItem {
                    name: "flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 200,
                },
                ShoppingListItem {
                    name: "milk".to_string(),
                    measurement_unit: "ml".to_string(),
                    amount: 350,
                },
            ]
        );
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_aggregate_keeps_units_apart(pool: PgPool) {
        let user = create_user(&pool, "cook").await;
        let pantry = stock_pantry(&pool).await;
        Ingredient::insert_many(
            &pool,
            &[NewIngredient {
                name: "milk".to_string(),
                measurement_unit: "l".to_string(),
            }],
        )
        .await
        .unwrap();
        let milk_litres = Ingredient::search(&pool, Some("milk"))
            .await
            .unwrap()
            .into_iter()
            .find(|i| i.measurement_unit == "l")
            .unwrap();
        let milk_ml = pantry.ingredients[2].id;

        let latte = Recipe::create(
            &pool,
            user.id,
            recipe("Latte", vec![pantry.tags[0].id], &[(milk_ml, 200), (milk_litres.id, 1)]),
        )
        .await
        .unwrap();
        RecipeList::ShoppingList.add(&pool, user.id, latte.id).await.unwrap();

        let items = ShoppingListItem::aggregate_for_user(&pool, user.id).await.unwrap();
        assert_eq!(
            items
                .iter()
                .map(|i| (i.measurement_unit.as_str(), i.amount))
                .collect::<Vec<_>>(),
            vec![("l", 1), ("ml", 200)]
        );
    }
}
