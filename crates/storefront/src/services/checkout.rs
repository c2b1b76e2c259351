//! Checkout and order history.

use std::cmp::Reverse;

use thiserror::Error;

use rigshop_core::builder::component_by_id;
use rigshop_core::{OrderStatus, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{CartItem, CartKey, ItemRef, NewOrder, Order, ShippingAddress, ValidationError};

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    InvalidShipping(#[from] ValidationError),

    #[error("cart is empty")]
    EmptyCart,

    /// A line can no longer be sold (gone or short on stock).
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CheckoutError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(message) => Self::Unavailable(message),
            other => Self::Repository(other),
        }
    }
}

/// Sort a customer's orders: pending first, then newest first.
pub fn sort_for_customer(orders: &mut [Order]) {
    orders.sort_by_key(|o| {
        (
            o.status != OrderStatus::Pending,
            Reverse(o.created_at),
            Reverse(o.id),
        )
    });
}

/// Places orders from a user's cart.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Turn the user's cart into a pending order.
    ///
    /// Line prices are refreshed from the catalog before the total is
    /// computed. The order is stored and the cart cleared in one step; if the
    /// cart changes in between, as with a second checkout of the same cart,
    /// nothing is placed. On failure the cart is untouched.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidShipping` for a blank address field,
    /// `CheckoutError::EmptyCart` when there is nothing to buy and
    /// `CheckoutError::Unavailable` when a line cannot be fulfilled or the
    /// cart changed during checkout.
    #[tracing::instrument(skip(self, shipping))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        shipping: ShippingAddress,
    ) -> Result<Order, CheckoutError> {
        let shipping = shipping.validated()?;
        let key = CartKey::User(user_id);

        let cart = self.store.get_cart(&key).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            lines.push(self.reprice(line.clone()).await?);
        }

        let order = self
            .store
            .place_order(NewOrder::from_lines(user_id, lines, shipping), &cart)
            .await?;

        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    async fn reprice(&self, mut line: CartItem) -> Result<CartItem, CheckoutError> {
        match &line.item {
            ItemRef::Product { id } => {
                let product = self.store.get_product(*id).await?.ok_or_else(|| {
                    CheckoutError::Unavailable(format!("{} is no longer available", line.name))
                })?;
                line.name = product.name;
                line.brand = product.brand;
                line.price = product.price;
            }
            ItemRef::Component { id } => {
                let (_, component) = component_by_id(id).ok_or_else(|| {
                    CheckoutError::Unavailable(format!("{} is no longer available", line.name))
                })?;
                line.name.clone_from(&component.name);
                line.brand = Some(component.brand.clone());
                line.price = component.price;
            }
        }
        Ok(line)
    }

    /// The user's orders, pending first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on storage failure.
    pub async fn orders_for(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        let mut orders = self.store.list_orders_for_user(user_id).await?;
        sort_for_customer(&mut orders);
        Ok(orders)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rigshop_core::{OrderId, Price, ProductCategory};

    use super::*;
    use crate::db::{CartRepository, JsonStore, OrderRepository, ProductRepository};
    use crate::models::{Cart, NewProduct, Product};

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Lovelace".to_owned(),
            address: "12 Analytical St".to_owned(),
            city: "London".to_owned(),
            phone: "555-0100".to_owned(),
        }
    }

    async fn setup(stock: u32) -> (tempfile::TempDir, JsonStore, Product) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        let product = store
            .create_product(NewProduct {
                name: "Monitor".to_owned(),
                description: None,
                brand: None,
                price: Price::from_dollars(200),
                category: ProductCategory::Displays,
                subcategory: None,
                stock,
                image_url: None,
                specs: BTreeMap::new(),
            })
            .await
            .unwrap();
        (dir, store, product)
    }

    fn cart_with(product: &Product, quantity: u32, stale_price: Price) -> Cart {
        let mut cart = Cart::default();
        cart.add(CartItem {
            item: ItemRef::Product { id: product.id },
            name: product.name.clone(),
            brand: None,
            price: stale_price,
            quantity,
            image_url: None,
        });
        cart.add(CartItem {
            item: ItemRef::Component {
                id: "gpu4".to_owned(),
            },
            name: "old listing".to_owned(),
            brand: None,
            price: Price::from_dollars(1),
            quantity: 1,
            image_url: None,
        });
        cart
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_and_reprices() {
        let (_dir, store, product) = setup(5).await;
        let user = UserId::new(1);
        let key = CartKey::User(user);
        store
            .save_cart(&key, &cart_with(&product, 2, Price::from_dollars(1)))
            .await
            .unwrap();

        let order = CheckoutService::new(&store)
            .place_order(user, shipping())
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total, Price::from_dollars(2 * 200 + 799));
        let gpu = &order.items[1];
        assert_eq!(gpu.name, "RTX 4070 Ti Super");
        assert_eq!(gpu.brand.as_deref(), Some("NVIDIA"));
        assert_eq!(gpu.unit_price, Price::from_dollars(799));
        assert!(store.get_cart(&key).await.unwrap().is_empty());
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_alone() {
        let (_dir, store, product) = setup(1).await;
        let user = UserId::new(1);
        let key = CartKey::User(user);
        let cart = cart_with(&product, 3, product.price);
        store.save_cart(&key, &cart).await.unwrap();

        let err = CheckoutService::new(&store)
            .place_order(user, shipping())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Unavailable(_)));
        assert_eq!(store.get_cart(&key).await.unwrap(), cart);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 1);
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_a_cart_is_checked_out_once() {
        let (_dir, store, product) = setup(100).await;
        let store = Arc::new(store);
        let user = UserId::new(1);
        let key = CartKey::User(user);

        for _ in 0..20 {
            store
                .save_cart(&key, &cart_with(&product, 1, product.price))
                .await
                .unwrap();

            let attempts: Vec<_> = (0..2)
                .map(|_| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        CheckoutService::new(store.as_ref())
                            .place_order(user, shipping())
                            .await
                    })
                })
                .collect();

            let mut placed = 0;
            for attempt in attempts {
                match attempt.await.unwrap() {
                    Ok(_) => placed += 1,
                    // the loser sees a changed cart or, arriving late, an empty one
                    Err(CheckoutError::Unavailable(_) | CheckoutError::EmptyCart) => {}
                    Err(e) => panic!("unexpected checkout error: {e}"),
                }
            }
            assert_eq!(placed, 1);
        }

        assert_eq!(store.list_orders(None).await.unwrap().len(), 20);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 80);
    }

    #[tokio::test]
    async fn test_empty_cart_and_bad_shipping() {
        let (_dir, store, _product) = setup(1).await;
        let checkout = CheckoutService::new(&store);

        assert!(matches!(
            checkout.place_order(UserId::new(1), shipping()).await,
            Err(CheckoutError::EmptyCart)
        ));

        let blank_phone = ShippingAddress {
            phone: String::new(),
            ..shipping()
        };
        assert!(matches!(
            checkout.place_order(UserId::new(1), blank_phone).await,
            Err(CheckoutError::InvalidShipping(_))
        ));
    }

    #[test]
    fn test_sort_for_customer() {
        let now = Utc::now();
        let order = |id, status, age_hours| Order {
            id: OrderId::new(id),
            user_id: Some(UserId::new(1)),
            items: Vec::new(),
            shipping: shipping(),
            total: Price::ZERO,
            status,
            created_at: now - Duration::hours(age_hours),
            updated_at: now,
        };
        let mut orders = vec![
            order(1, OrderStatus::Delivered, 1),
            order(2, OrderStatus::Pending, 48),
            order(3, OrderStatus::Shipped, 0),
            order(4, OrderStatus::Pending, 2),
        ];
        sort_for_customer(&mut orders);
        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);
    }
}
