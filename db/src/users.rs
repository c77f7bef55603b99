use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_superuser: bool,
}

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, is_superuser, date_joined";

impl User {
    #[tracing::instrument(skip(pool, new_user), fields(username = %new_user.username), err)]
    pub async fn create(pool: &PgPool, new_user: NewUser) -> Result<Self> {
        let user = sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users (email, username, first_name, last_name, password_hash, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new_user.email)
        .bind(new_user.username)
        .bind(new_user.first_name)
        .bind(new_user.last_name)
        .bind(new_user.password_hash)
        .bind(new_user.is_superuser)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_many(pool: &PgPool, ids: &[i64]) -> Result<Vec<Self>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn email_taken(pool: &PgPool, email: &str) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    pub async fn username_taken(pool: &PgPool, username: &str) -> Result<bool> {
        let taken =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(pool)
                .await?;

        Ok(taken)
    }

    /// Users ordered by id, one page at a time.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, pool, password_hash), fields(user_id = self.id), err)]
    pub async fn set_password_hash(&self, pool: &PgPool, password_hash: String) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(self.id)
            .bind(password_hash)
            .execute(pool)
            .await?;

        Ok(())
    }
}
