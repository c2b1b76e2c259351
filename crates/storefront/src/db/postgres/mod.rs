//! `PostgreSQL` backend.
//!
//! ## Tables
//!
//! - `products` - catalog, `specs` as JSONB
//! - `users` - accounts with an argon2 password hash
//! - `orders` - line items and shipping address as JSONB
//! - `carts` - one row per cart key, items as JSONB

mod carts;
mod orders;
mod products;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{RepositoryError, Store};

/// `PostgreSQL` store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Apply pending migrations from `crates/storefront/migrations/`.
///
/// # Errors
///
/// Returns `RepositoryError::Migration` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Map a unique violation to `Conflict`, everything else to `Database`.
fn unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}
