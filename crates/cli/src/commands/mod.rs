//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod users;

use std::sync::Arc;

use rigshop_storefront::config::{ConfigError, StorageConfig};
use rigshop_storefront::db::{self, RepositoryError, Store};

/// Errors surfaced by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Account error: {0}")]
    Auth(#[from] rigshop_storefront::services::auth::AuthError),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid product in seed file: {0}")]
    Validation(#[from] rigshop_storefront::models::ValidationError),

    #[error("Migrations need RIGSHOP_STORAGE=postgres")]
    NotPostgres,
}

/// Open the store the environment configures.
async fn open_configured_store() -> Result<Arc<dyn Store>, CommandError> {
    let storage = StorageConfig::from_env()?;
    let store = db::open_store(&storage).await?;
    tracing::info!(backend = store.backend(), "Store opened");
    Ok(store)
}
