//! Database migration command.
//!
//! Applies `crates/storefront/migrations/` to the database named by
//! `RIGSHOP_DATABASE_URL` (or `DATABASE_URL`). The JSON backend has no schema.

use rigshop_storefront::config::StorageConfig;
use rigshop_storefront::db::{RepositoryError, create_pool, postgres::run_migrations};

use super::CommandError;

/// Run the storefront migrations.
///
/// # Errors
///
/// Returns `CommandError::NotPostgres` when the JSON backend is configured,
/// or a storage error if connecting or migrating fails.
pub async fn run() -> Result<(), CommandError> {
    let StorageConfig::Postgres { database_url } = StorageConfig::from_env()? else {
        return Err(CommandError::NotPostgres);
    };

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url)
        .await
        .map_err(RepositoryError::from)?;

    tracing::info!("Running migrations...");
    run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
