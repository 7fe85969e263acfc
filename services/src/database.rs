use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Initialize a PostgreSQL connection pool and bring the schema up to date.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(config.database_url())
        .await?;

    tracing::info!("Database connection pool established");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
