//! Storage for the storefront.
//!
//! Every entity sits behind its own repository trait; a [`Store`] bundles all
//! four so handlers hold a single `Arc<dyn Store>`. Two backends exist:
//!
//! - [`json::JsonStore`] - one JSON file per collection in a data directory
//! - [`postgres::PgStore`] - `PostgreSQL` through sqlx
//!
//! # Migrations
//!
//! `PostgreSQL` migrations are stored in `crates/storefront/migrations/` and
//! run via:
//! ```bash
//! cargo run -p rigshop-cli -- migrate
//! ```

pub mod json;
pub mod postgres;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use rigshop_core::{Email, OrderId, OrderStatus, ProductCategory, ProductId, UserId, UserRole};

use crate::config::StorageConfig;
use crate::models::{
    Cart, CartKey, NewOrder, NewProduct, NewUser, Order, Product, ProductFilter, ProductUpdate,
    User, UserUpdate,
};

pub use json::JsonStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Reading or writing a data file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (unique email, insufficient stock, last admin).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A user together with their password hash. Only the login path sees this.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Products matching `filter`, ordered by id.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Apply a partial update. `NotFound` when the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn count_products_by_category(
        &self,
    ) -> Result<BTreeMap<ProductCategory, u64>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users, ordered by id.
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    async fn get_user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError>;

    /// `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// `NotFound` for an unknown user, `Conflict` for a taken email or when the
    /// update would demote the last admin.
    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError>;

    /// `Conflict` when deleting the last admin. Returns `false` when nothing
    /// was deleted.
    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError>;

    async fn count_users_by_role(&self) -> Result<BTreeMap<UserRole, u64>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// All orders, newest first.
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Orders placed by `user_id`, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Store a pending order, take its product lines out of stock and clear
    /// the buyer's cart, all at once.
    ///
    /// `cart` is the cart the order was built from. Nothing changes when the
    /// stored cart no longer equals it, or when any product is missing or
    /// short on stock; those cases are a `Conflict`.
    async fn place_order(&self, order: NewOrder, cart: &Cart) -> Result<Order, RepositoryError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    async fn count_orders_by_status(&self) -> Result<BTreeMap<OrderStatus, u64>, RepositoryError>;
}

/// An in-place change to a stored cart. Returning `Err` leaves the cart as
/// it was.
pub type CartEdit<'a> = Box<dyn FnOnce(&mut Cart) -> Result<(), RepositoryError> + Send + 'a>;

/// Box a closure as a [`CartEdit`].
pub fn cart_edit<'a>(
    edit: impl FnOnce(&mut Cart) -> Result<(), RepositoryError> + Send + 'a,
) -> CartEdit<'a> {
    Box::new(edit)
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The stored cart, empty when there is none.
    async fn get_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError>;

    /// Replace the stored cart. An empty cart is deleted.
    async fn save_cart(&self, key: &CartKey, cart: &Cart) -> Result<(), RepositoryError>;

    /// Load, edit and save a cart as one step and return the result. Edits
    /// to the same cart never interleave.
    async fn update_cart(&self, key: &CartKey, edit: CartEdit<'_>) -> Result<Cart, RepositoryError>;

    /// Delete a cart, returning what it held.
    async fn delete_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError>;
}

/// A complete storage backend.
#[async_trait]
pub trait Store: ProductRepository + UserRepository + OrderRepository + CartRepository {
    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Open the backend selected by `config`.
///
/// # Errors
///
/// Returns `RepositoryError` if the data directory cannot be read or the
/// database cannot be reached.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn Store>, RepositoryError> {
    match config {
        StorageConfig::Json { data_dir } => {
            let store = JsonStore::open(data_dir).await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Tally `items` by `key`.
pub(crate) fn tally<T, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> BTreeMap<K, u64> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}
