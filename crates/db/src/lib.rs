//! Adreel record store.
//!
//! Generation records live behind the [`GenerationStore`] trait. The
//! Postgres implementation uses the sqlx repository in
//! [`repositories`]; the in-memory implementation backs tests and local
//! runs without a database. Both publish every change on the shared
//! [`EventBus`](adreel_events::EventBus) so watchers can follow a record.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::memory::MemoryGenerationStore;
pub use store::postgres::PgGenerationStore;
pub use store::{GenerationStore, GenerationWatch, StoreError, WatchEvent};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
