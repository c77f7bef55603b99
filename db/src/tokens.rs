use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::users::User;

/// API token handed out on login. Each user holds at most one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthToken {
    pub key: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    /// Returns the user's existing token, or stores `candidate_key` as a new one.
    #[tracing::instrument(skip(pool, candidate_key), err)]
    pub async fn get_or_create(pool: &PgPool, user_id: i64, candidate_key: &str) -> Result<Self> {
        let token = sqlx::query_as::<_, AuthToken>(
            r"
            INSERT INTO auth_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = auth_tokens.user_id
            RETURNING key, user_id, created_at
            ",
        )
        .bind(candidate_key)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    pub async fn find_user(pool: &PgPool, key: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                   u.password_hash, u.is_superuser, u.date_joined
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.key = $1
            ",
        )
        .bind(key)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(pool), err)]
    pub async fn delete_for_user(pool: &PgPool, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
