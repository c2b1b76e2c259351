//! Orders placed from a cart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigshop_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use super::{CartItem, ItemRef, ValidationError, require};

/// A line of a placed order. Prices are frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item: ItemRef,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

impl From<CartItem> for OrderItem {
    fn from(line: CartItem) -> Self {
        Self {
            item: line.item,
            name: line.name,
            brand: line.brand,
            unit_price: line.price,
            quantity: line.quantity,
            image_url: line.image_url,
        }
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: String,
}

impl ShippingAddress {
    /// Every field is required. Values are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first blank field.
    pub fn validated(self) -> Result<Self, ValidationError> {
        require("full_name", &self.full_name)?;
        require("address", &self.address)?;
        require("city", &self.city)?;
        require("phone", &self.phone)?;
        Ok(Self {
            full_name: self.full_name.trim().to_owned(),
            address: self.address.trim().to_owned(),
            city: self.city.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` once the account that placed it has been deleted.
    pub user_id: Option<UserId>,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingAddress,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order about to be placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingAddress,
    pub total: Price,
}

impl NewOrder {
    /// Build an order from cart lines, computing the total.
    #[must_use]
    pub fn from_lines(user_id: UserId, lines: Vec<CartItem>, shipping: ShippingAddress) -> Self {
        let items: Vec<OrderItem> = lines.into_iter().map(OrderItem::from).collect();
        let total = items.iter().map(OrderItem::line_total).sum();
        Self {
            user_id,
            items,
            shipping,
            total,
        }
    }

    /// Units requested per catalog product. Builder components carry no stock
    /// and are left out.
    #[must_use]
    pub fn product_quantities(&self) -> BTreeMap<ProductId, u32> {
        let mut wanted = BTreeMap::new();
        for line in &self.items {
            if let Some(id) = line.item.product_id() {
                let quantity: &mut u32 = wanted.entry(id).or_insert(0);
                *quantity = quantity.saturating_add(line.quantity);
            }
        }
        wanted
    }

    /// Stamp the order as a new pending order.
    #[must_use]
    pub fn into_order(self, id: OrderId, now: DateTime<Utc>) -> Order {
        Order {
            id,
            user_id: Some(self.user_id),
            items: self.items,
            shipping: self.shipping,
            total: self.total,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: " Ada Lovelace ".to_owned(),
            address: "12 Analytical St".to_owned(),
            city: "London".to_owned(),
            phone: "555-0100".to_owned(),
        }
    }

    #[test]
    fn test_shipping_requires_every_field() {
        assert_eq!(address().validated().unwrap().full_name, "Ada Lovelace");

        let missing_city = ShippingAddress {
            city: "  ".to_owned(),
            ..address()
        };
        assert_eq!(
            missing_city.validated().unwrap_err().to_string(),
            "city is required"
        );
    }

    #[test]
    fn test_new_order_computes_total() {
        let lines = vec![
            CartItem {
                item: ItemRef::Product {
                    id: ProductId::new(1),
                },
                name: "Mouse".to_owned(),
                brand: None,
                price: Price::from_cents(2_999),
                quantity: 2,
                image_url: None,
            },
            CartItem {
                item: ItemRef::Component {
                    id: "psu1".to_owned(),
                },
                name: "RM850x".to_owned(),
                brand: Some("Corsair".to_owned()),
                price: Price::from_dollars(129),
                quantity: 1,
                image_url: None,
            },
        ];

        let order = NewOrder::from_lines(UserId::new(3), lines, address())
            .into_order(OrderId::new(1), Utc::now());

        assert_eq!(order.total, Price::from_cents(2 * 2_999 + 12_900));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, Some(UserId::new(3)));
        assert_eq!(order.items[1].unit_price, Price::from_dollars(129));
    }

    #[test]
    fn test_product_quantities_skip_components() {
        let line = |item: ItemRef, quantity| CartItem {
            item,
            name: "x".to_owned(),
            brand: None,
            price: Price::from_dollars(1),
            quantity,
            image_url: None,
        };
        let order = NewOrder::from_lines(
            UserId::new(1),
            vec![
                line(ItemRef::Product { id: ProductId::new(2) }, 1),
                line(ItemRef::Component { id: "gpu1".to_owned() }, 1),
                line(ItemRef::Product { id: ProductId::new(2) }, 3),
            ],
            address(),
        );
        let wanted = order.product_quantities();
        assert_eq!(wanted.len(), 1);
        assert_eq!(wanted.get(&ProductId::new(2)), Some(&4));
    }
}
