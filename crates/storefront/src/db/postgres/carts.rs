//! Cart queries.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use super::PgStore;
use crate::db::{CartEdit, CartRepository, RepositoryError};
use crate::models::{Cart, CartItem, CartKey};

/// Lock a cart row for the rest of the transaction and return its items.
///
/// A placeholder row is inserted first so there is always a row to lock,
/// even for a cart that does not exist yet.
pub(super) async fn lock_cart(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
) -> Result<Cart, RepositoryError> {
    sqlx::query("INSERT INTO carts (cart_key) VALUES ($1) ON CONFLICT (cart_key) DO NOTHING")
        .bind(key)
        .execute(&mut **tx)
        .await?;

    let Json(items): Json<Vec<CartItem>> =
        sqlx::query_scalar("SELECT items FROM carts WHERE cart_key = $1 FOR UPDATE")
            .bind(key)
            .fetch_one(&mut **tx)
            .await?;

    Ok(Cart { items })
}

/// Write a locked cart back; an empty cart removes the row.
pub(super) async fn store_cart(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    cart: &Cart,
) -> Result<(), RepositoryError> {
    if cart.is_empty() {
        sqlx::query("DELETE FROM carts WHERE cart_key = $1")
            .bind(key)
            .execute(&mut **tx)
            .await?;
    } else {
        sqlx::query("UPDATE carts SET items = $2, updated_at = now() WHERE cart_key = $1")
            .bind(key)
            .bind(Json(&cart.items))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl CartRepository for PgStore {
    async fn get_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError> {
        let items: Option<Json<Vec<CartItem>>> =
            sqlx::query_scalar("SELECT items FROM carts WHERE cart_key = $1")
                .bind(key.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(items.map_or_else(Cart::default, |Json(items)| Cart { items }))
    }

    async fn save_cart(&self, key: &CartKey, cart: &Cart) -> Result<(), RepositoryError> {
        if cart.is_empty() {
            self.delete_cart(key).await?;
            return Ok(());
        }

        sqlx::query(
            r"
            INSERT INTO carts (cart_key, items, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (cart_key)
            DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(key.to_string())
        .bind(Json(&cart.items))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_cart(&self, key: &CartKey, edit: CartEdit<'_>) -> Result<Cart, RepositoryError> {
        let key = key.to_string();
        let mut tx = self.pool.begin().await?;

        let mut cart = lock_cart(&mut tx, &key).await?;
        // dropping the transaction rolls back the placeholder row
        edit(&mut cart)?;
        store_cart(&mut tx, &key, &cart).await?;

        tx.commit().await?;
        Ok(cart)
    }

    async fn delete_cart(&self, key: &CartKey) -> Result<Cart, RepositoryError> {
        let items: Option<Json<Vec<CartItem>>> =
            sqlx::query_scalar("DELETE FROM carts WHERE cart_key = $1 RETURNING items")
                .bind(key.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(items.map_or_else(Cart::default, |Json(items)| Cart { items }))
    }
}
