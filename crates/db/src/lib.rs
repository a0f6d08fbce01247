//! Durable widget configuration.
//!
//! - [`store::ConfigStore`] -- the boundary the refresh pipeline depends on.
//! - [`postgres::PgConfigStore`] -- production store backed by the `widgets` table.
//! - [`memory::InMemoryConfigStore`] -- process-local store for development and tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use memory::InMemoryConfigStore;
pub use postgres::PgConfigStore;
pub use store::{ConfigChange, ConfigStore, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
