//! Flat-file backend.
//!
//! Each collection lives in its own file (`products.json`, `users.json`,
//! `orders.json`, `carts.json`) and is held in memory behind an async lock.
//! A write clones the collection, applies the change, writes the clone to a
//! `.tmp` sibling and renames it over the original. Only then does the
//! in-memory copy change, so a failed write leaves both untouched.
//!
//! The last id handed out per collection is kept in `sequences.json`, so a
//! deleted record's id is never given to a new one.
//!
//! Operations that hold several locks take them in the order products,
//! orders, carts, sequences.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use rigshop_core::{Email, OrderId, OrderStatus, ProductCategory, ProductId, UserId, UserRole};

use super::{
    CartEdit, CartRepository, OrderRepository, ProductRepository, RepositoryError, Store, UserCredentials,
    UserRepository, tally,
};
use crate::models::{
    Cart, CartKey, NewOrder, NewProduct, NewUser, Order, Product, ProductFilter, ProductUpdate,
    User, UserUpdate,
};

const PRODUCTS_FILE: &str = "products.json";
const USERS_FILE: &str = "users.json";
const ORDERS_FILE: &str = "orders.json";
const CARTS_FILE: &str = "carts.json";
const SEQUENCES_FILE: &str = "sequences.json";

/// Highest id handed out per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Sequences {
    #[serde(default)]
    products: i32,
    #[serde(default)]
    users: i32,
    #[serde(default)]
    orders: i32,
}

impl Sequences {
    /// Raise each counter to at least the largest stored id, for files
    /// written before the counters existed.
    fn cover(
        &mut self,
        products: impl Iterator<Item = i32>,
        users: impl Iterator<Item = i32>,
        orders: impl Iterator<Item = i32>,
    ) {
        self.products = products.fold(self.products, i32::max);
        self.users = users.fold(self.users, i32::max);
        self.orders = orders.fold(self.orders, i32::max);
    }
}

/// On-disk user record.
///
/// Older files carry `is_admin` instead of `role`; such records are read as
/// admin or user and rewritten with a role on the next save.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: UserId,
    email: Email,
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_admin: Option<bool>,
    #[serde(alias = "password")]
    password_hash: String,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl StoredUser {
    fn role(&self) -> UserRole {
        UserRole::from_legacy(self.role, self.is_admin)
    }

    fn to_user(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// JSON file store.
#[derive(Debug)]
pub struct JsonStore {
    dir: PathBuf,
    products: RwLock<Vec<Product>>,
    users: RwLock<Vec<StoredUser>>,
    orders: RwLock<Vec<Order>>,
    carts: RwLock<BTreeMap<String, Cart>>,
    sequences: Mutex<Sequences>,
}

impl JsonStore {
    /// Open the store in `dir`, creating the directory if needed.
    /// Missing files are empty collections.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Io` if the directory cannot be created or a
    /// file cannot be read, and `RepositoryError::DataCorruption` if a file is
    /// not valid JSON for its collection.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let products: Vec<Product> = load(&dir, PRODUCTS_FILE).await?;
        let users: Vec<StoredUser> = load(&dir, USERS_FILE).await?;
        let orders: Vec<Order> = load(&dir, ORDERS_FILE).await?;
        let carts = load(&dir, CARTS_FILE).await?;
        let mut sequences: Sequences = load(&dir, SEQUENCES_FILE).await?;
        sequences.cover(
            products.iter().map(|p| p.id.as_i32()),
            users.iter().map(|u| u.id.as_i32()),
            orders.iter().map(|o| o.id.as_i32()),
        );

        tracing::info!(dir = %dir.display(), "Opened JSON store");

        Ok(Self {
            dir,
            products: RwLock::new(products),
            users: RwLock::new(users),
            orders: RwLock::new(orders),
            carts: RwLock::new(carts),
            sequences: Mutex::new(sequences),
        })
    }

    /// Directory holding the collection files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn persist<T: Serialize + ?Sized>(
        &self,
        file: &str,
        value: &T,
    ) -> Result<(), RepositoryError> {
        let path = self.dir.join(file);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Rewrite a file with its previous contents after a later write in the
    /// same operation failed.
    async fn restore<T: Serialize + ?Sized>(&self, file: &str, value: &T) {
        if let Err(e) = self.persist(file, value).await {
            tracing::error!(error = %e, file, "Failed to restore data file");
        }
    }

    /// Reserve the next id from one counter. The caller holds the
    /// collection's write lock.
    async fn next_id(&self, counter: fn(&mut Sequences) -> &mut i32) -> Result<i32, RepositoryError> {
        let mut sequences = self.sequences.lock().await;
        let mut next = *sequences;
        let slot = counter(&mut next);
        *slot = slot
            .checked_add(1)
            .ok_or_else(|| RepositoryError::DataCorruption("id sequence exhausted".to_owned()))?;
        let id = *slot;

        self.persist(SEQUENCES_FILE, &next).await?;
        *sequences = next;
        Ok(id)
    }
}

async fn load<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> Result<T, RepositoryError> {
    let bytes = match tokio::fs::read(dir.join(file)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| RepositoryError::DataCorruption(format!("{file}: {e}")))
}

fn admin_count(users: &[StoredUser]) -> usize {
    users.iter().filter(|u| u.role() == UserRole::Admin).count()
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl ProductRepository for JsonStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut matching: Vec<Product> = products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.id);
        Ok(matching)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let id = ProductId::new(self.next_id(|s| &mut s.products).await?);
        let product = product.into_product(id, Utc::now());

        let mut next = products.clone();
        next.push(product.clone());
        self.persist(PRODUCTS_FILE, &next).await?;
        *products = next;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let mut next = products.clone();
        let product = next
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        update.apply_to(product, Utc::now());
        let updated = product.clone();

        self.persist(PRODUCTS_FILE, &next).await?;
        *products = next;
        Ok(updated)
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        if !products.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        let next: Vec<Product> = products.iter().filter(|p| p.id != id).cloned().collect();
        self.persist(PRODUCTS_FILE, &next).await?;
        *products = next;
        Ok(true)
    }

    async fn count_products_by_category(
        &self,
    ) -> Result<BTreeMap<ProductCategory, u64>, RepositoryError> {
        let products = self.products.read().await;
        Ok(tally(products.as_slice(), |p| p.category))
    }
}

#[async_trait]
impl UserRepository for JsonStore {
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut list: Vec<User> = users.iter().map(StoredUser::to_user).collect();
        list.sort_by_key(|u| u.id);
        Ok(list)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).map(StoredUser::to_user))
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| &u.email == email)
            .map(StoredUser::to_user))
    }

    async fn get_user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| &u.email == email)
            .map(|u| UserCredentials {
                user: u.to_user(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let id = UserId::new(self.next_id(|s| &mut s.users).await?);
        let now = Utc::now();
        let stored = StoredUser {
            id,
            email: user.email,
            name: user.name,
            role: Some(user.role),
            is_admin: None,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        let created = stored.to_user();

        let mut next = users.clone();
        next.push(stored);
        self.persist(USERS_FILE, &next).await?;
        *users = next;
        Ok(created)
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let current = users
            .iter()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if update.demotes(current.role()) && admin_count(&users) <= 1 {
            return Err(RepositoryError::Conflict(
                "cannot demote the last admin".to_owned(),
            ));
        }
        if let Some(email) = &update.email
            && users.iter().any(|u| u.id != id && &u.email == email)
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let mut next = users.clone();
        let stored = next
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if let Some(name) = update.name {
            stored.name = name;
        }
        if let Some(email) = update.email {
            stored.email = email;
        }
        if let Some(role) = update.role {
            stored.role = Some(role);
        } else {
            stored.role = Some(stored.role());
        }
        stored.is_admin = None;
        if let Some(hash) = update.password_hash {
            stored.password_hash = hash;
        }
        stored.updated_at = Utc::now();
        let updated = stored.to_user();

        self.persist(USERS_FILE, &next).await?;
        *users = next;
        Ok(updated)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        let Some(current) = users.iter().find(|u| u.id == id) else {
            return Ok(false);
        };
        if current.role() == UserRole::Admin && admin_count(&users) <= 1 {
            return Err(RepositoryError::Conflict(
                "cannot delete the last admin".to_owned(),
            ));
        }

        let next: Vec<StoredUser> = users.iter().filter(|u| u.id != id).cloned().collect();
        self.persist(USERS_FILE, &next).await?;
        *users = next;
        Ok(true)
    }

    async fn count_users_by_role(&self) -> Result<BTreeMap<UserRole, u64>, RepositoryError> {
        let users = self.users.read().await;
        Ok(tally(users.as_slice(), StoredUser::role))
    }
}

#[async_trait]
impl OrderRepository for JsonStore {
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut list: Vec<Order> = orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        newest_first(&mut list);
        Ok(list)
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut list: Vec<Order> = orders
            .iter()
            .filter(|o| o.user_id == Some(user_id))
            .cloned()
            .collect();
        newest_first(&mut list);
        Ok(list)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    async fn place_order(&self, order: NewOrder, cart: &Cart) -> Result<Order, RepositoryError> {
        let mut products = self.products.write().await;
        let mut orders = self.orders.write().await;
        let mut carts = self.carts.write().await;

        let cart_key = CartKey::User(order.user_id).to_string();
        if carts.get(&cart_key).map_or(!cart.is_empty(), |stored| stored != cart) {
            return Err(RepositoryError::Conflict(
                "cart changed during checkout".to_owned(),
            ));
        }

        let wanted = order.product_quantities();

        let now = Utc::now();
        let mut next_products = products.clone();
        for (id, quantity) in &wanted {
            let product = next_products
                .iter_mut()
                .find(|p| p.id == *id)
                .ok_or_else(|| RepositoryError::Conflict(format!("product {id} no longer exists")))?;
            if product.stock < *quantity {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for {}",
                    product.name
                )));
            }
            product.stock -= quantity;
            product.updated_at = now;
        }

        let id = OrderId::new(self.next_id(|s| &mut s.orders).await?);
        let placed = order.into_order(id, now);
        let mut next_orders = orders.clone();
        next_orders.push(placed.clone());
        let mut next_carts = carts.clone();
        let had_cart = next_carts.remove(&cart_key).is_some();

        if !wanted.is_empty() {
            self.persist(PRODUCTS_FILE, &next_products).await?;
        }
        if let Err(e) = self.persist(ORDERS_FILE, &next_orders).await {
            if !wanted.is_empty() {
                self.restore(PRODUCTS_FILE, &*products).await;
            }
            return Err(e);
        }
        if had_cart && let Err(e) = self.persist(CARTS_FILE, &next_carts).await {
            self.restore(ORDERS_FILE, &*orders).await;
            if !wanted.is_empty() {
                self.restore(PRODUCTS_FILE, &*products).await;
            }
            return Err(e);
        }

        *products = next_products;
        *orders = next_orders;
        *carts = next_carts;
        Ok(placed)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let mut next = orders.clone();
        let order = next
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        let updated = order.clone();

        self.persist(ORDERS_FILE, &next).await?;
        *orders = next;
        Ok(updated)
    }

    async fn count_orders_by_status(&self) -> Result<BTreeMap<OrderStatus, u64>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(tally(orders.as_slice(), |o| o.status))
    }
}

#[async_trait]
impl CartRepository for JsonStore {
    async fn get_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&key.to_string()).cloned().unwrap_or_default())
    }

    async fn save_cart(&self, key: &CartKey, cart: &Cart) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        let mut next = carts.clone();
        if cart.is_empty() {
            next.remove(&key.to_string());
        } else {
            next.insert(key.to_string(), cart.clone());
        }
        self.persist(CARTS_FILE, &next).await?;
        *carts = next;
        Ok(())
    }

    async fn update_cart(&self, key: &CartKey, edit: CartEdit<'_>) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.write().await;
        let name = key.to_string();
        let current = carts.get(&name).cloned().unwrap_or_default();
        let mut cart = current.clone();
        edit(&mut cart)?;
        if cart == current {
            return Ok(cart);
        }

        let mut next = carts.clone();
        if cart.is_empty() {
            next.remove(&name);
        } else {
            next.insert(name, cart.clone());
        }
        self.persist(CARTS_FILE, &next).await?;
        *carts = next;
        Ok(cart)
    }

    async fn delete_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError> {
        let mut carts = self.carts.write().await;
        let name = key.to_string();
        let Some(removed) = carts.get(&name).cloned() else {
            return Ok(Cart::default());
        };
        let mut next = carts.clone();
        next.remove(&name);
        self.persist(CARTS_FILE, &next).await?;
        *carts = next;
        Ok(removed)
    }
}

#[async_trait]
impl Store for JsonStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        let meta = tokio::fs::metadata(&self.dir).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(RepositoryError::DataCorruption(format!(
                "{} is not a directory",
                self.dir.display()
            )))
        }
    }
}
