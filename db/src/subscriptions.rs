use std::collections::HashSet;

use color_eyre::Result;
use sqlx::PgPool;

use crate::users::User;

/// A follow relationship: `user_id` subscribes to recipes by `author_id`.
pub struct Subscription;

impl Subscription {
    /// Returns `false` when the subscription already existed.
    #[tracing::instrument(skip(pool), err)]
    pub async fn create(pool: &PgPool, user_id: i64, author_id: i64) -> Result<bool> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO subscriptions (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await?;

        Ok(inserted.is_some())
    }

    /// Returns `false` when there was nothing to delete.
    #[tracing::instrument(skip(pool), err)]
    pub async fn delete(pool: &PgPool, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The subset of `author_ids` the user is subscribed to.
    pub async fn followed_among(
        pool: &PgPool,
        user_id: i64,
        author_ids: &[i64],
    ) -> Result<HashSet<i64>> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
        )
        .bind(user_id)
        .bind(author_ids)
        .fetch_all(pool)
        .await?;

        Ok(found.into_iter().collect())
    }

    /// Authors the user follows, most recent subscription first.
    pub async fn authors_for(
        pool: &PgPool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>> {
        let authors = sqlx::query_as::<_, User>(
            r"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                   u.password_hash, u.is_superuser, u.date_joined
            FROM subscriptions s
            JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY s.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(authors)
    }

    pub async fn count_for(pool: &PgPool, user_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::test_support::create_user;

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_subscribe_is_idempotent_and_listed_newest_first(pool: PgPool) {
        let reader = create_user(&pool, "reader").await;
        let chef = create_user(&pool, "chef").await;
        let baker = create_user(&pool, "baker").await;

        assert!(Subscription::create(&pool, reader.id, chef.id).await.unwrap());
        assert!(!Subscription::create(&pool, reader.id, chef.id).await.unwrap());
        assert!(Subscription::create(&pool, reader.id, baker.id).await.unwrap());

        assert_eq!(Subscription::count_for(&pool, reader.id).await.unwrap(), 2);

        let authors = Subscription::authors_for(&pool, reader.id, 10, 0).await.unwrap();
        assert_eq!(
            authors.iter().map(|a| a.username.as_str()).collect::<Vec<_>>(),
            vec!["baker", "chef"]
        );

        let followed = Subscription::followed_among(&pool, reader.id, &[chef.id, reader.id])
            .await
            .unwrap();
        assert_eq!(followed, HashSet::from([chef.id]));
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_delete_reports_missing_subscription(pool: PgPool) {
        let reader = create_user(&pool, "reader").await;
        let chef = create_user(&pool, "chef").await;

        assert!(!Subscription::delete(&pool, reader.id, chef.id).await.unwrap());

        Subscription::create(&pool, reader.id, chef.id).await.unwrap();
        assert!(Subscription::delete(&pool, reader.id, chef.id).await.unwrap());
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "pg-tests"), ignore = "requires a Postgres DATABASE_URL")]
    async fn test_self_subscription_is_rejected_by_the_schema(pool: PgPool) {
        let reader = create_user(&pool, "reader").await;

        assert!(Subscription::create(&pool, reader.id, reader.id).await.is_err());
    }
}
