use color_eyre::{eyre::Context, Result};
use sqlx::postgres::PgPoolOptions;

pub mod ingredients;
pub mod recipe_lists;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod tokens;
pub mod users;

pub use sqlx;
pub use sqlx::PgPool;

#[tracing::instrument(err, skip(database_url))]
pub async fn setup_db_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to the database")?;

    const MIGRATION_LOCK_ID: i64 = 0xF0_0D_F0_0D_F0_0D;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(&pool)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    let unlocked: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .fetch_one(&pool)
        .await?;

    if unlocked {
        tracing::info!("Migration lock unlocked");
    } else {
        tracing::warn!("Migration lock was not held when unlocking");
    }

    Ok(pool)
}
