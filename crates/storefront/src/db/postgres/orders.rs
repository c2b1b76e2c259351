//! Order queries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use rigshop_core::{OrderId, OrderStatus, Price, UserId};

use super::carts::{lock_cart, store_cart};
use super::{PgStore, count};
use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Cart, CartKey, NewOrder, Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, items, shipping, total, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    items: Json<Vec<OrderItem>>,
    shipping: Json<ShippingAddress>,
    total: Price,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            items: row.items.0,
            shipping: row.shipping.0,
            total: row.total,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE $1::order_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    async fn place_order(&self, order: NewOrder, cart: &Cart) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // the cart row is locked before any product row
        let cart_key = CartKey::User(order.user_id).to_string();
        if lock_cart(&mut tx, &cart_key).await? != *cart {
            return Err(RepositoryError::Conflict(
                "cart changed during checkout".to_owned(),
            ));
        }

        // BTreeMap order keeps row locks in id order across transactions
        for (id, quantity) in order.product_quantities() {
            let quantity = i32::try_from(quantity)
                .map_err(|_| RepositoryError::Conflict("quantity is too large".to_owned()))?;

            let (name, stock): (String, i32) =
                sqlx::query_as("SELECT name, stock FROM products WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| {
                        RepositoryError::Conflict(format!("product {id} no longer exists"))
                    })?;

            if stock < quantity {
                return Err(RepositoryError::Conflict(format!(
                    "insufficient stock for {name}"
                )));
            }

            sqlx::query("UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(quantity)
                .execute(&mut *tx)
                .await?;
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, items, shipping, total, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(Json(&order.shipping))
        .bind(order.total)
        .fetch_one(&mut *tx)
        .await?;

        store_cart(&mut tx, &cart_key, &Cart::default()).await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn count_orders_by_status(&self) -> Result<BTreeMap<OrderStatus, u64>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(s, n)| (s, count(n))).collect())
    }
}
