//! Shopping carts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rigshop_core::{Price, ProductId, UserId};

/// What a cart or order line refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemRef {
    /// A catalog product.
    Product { id: ProductId },
    /// A PC builder component, by catalog id (`"cpu1"`).
    Component { id: String },
}

impl ItemRef {
    /// The product id, for product lines.
    #[must_use]
    pub const fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Product { id } => Some(*id),
            Self::Component { .. } => None,
        }
    }
}

/// Storage key of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartKey {
    /// The cart of a signed-in user.
    User(UserId),
    /// An anonymous cart identified by the `X-Cart-Id` header.
    Guest(Uuid),
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

impl FromStr for CartKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid cart key: {s}");
        match s.split_once(':') {
            Some(("user", id)) => id
                .parse::<i32>()
                .map(|id| Self::User(UserId::new(id)))
                .map_err(|_| invalid()),
            Some(("guest", id)) => Uuid::parse_str(id).map(Self::Guest).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// One line in a cart. Name, brand and price are copied in when the line
/// is added so the cart renders without a catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub item: ItemRef,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A cart: an ordered list of lines with at most one line per item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Units of `item` already in the cart.
    #[must_use]
    pub fn quantity_of(&self, item: &ItemRef) -> u32 {
        self.items
            .iter()
            .find(|line| &line.item == item)
            .map_or(0, |line| line.quantity)
    }

    /// Add `line`, merging with an existing line for the same item.
    ///
    /// Merging adds quantities and refreshes the copied name, brand, price
    /// and image.
    pub fn add(&mut self, line: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|l| l.item == line.item) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            existing.name = line.name;
            existing.brand = line.brand;
            existing.price = line.price;
            existing.image_url = line.image_url;
        } else if line.quantity > 0 {
            self.items.push(line);
        }
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// Returns `false` when the item is not in the cart.
    pub fn set_quantity(&mut self, item: &ItemRef, quantity: i64) -> bool {
        let Some(position) = self.items.iter().position(|line| &line.item == item) else {
            return false;
        };
        if quantity <= 0 {
            self.items.remove(position);
        } else if let Some(line) = self.items.get_mut(position) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
        true
    }

    /// Remove a line. Returns `false` when the item is not in the cart.
    pub fn remove(&mut self, item: &ItemRef) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.item != item);
        self.items.len() != before
    }

    /// Fold every line of `other` into this cart.
    pub fn merge(&mut self, other: Self) {
        for line in other.items {
            self.add(line);
        }
    }
}

/// Cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total: Price,
    pub item_count: u32,
}

impl From<Cart> for CartSummary {
    fn from(cart: Cart) -> Self {
        Self {
            total: cart.total(),
            item_count: cart.item_count(),
            items: cart.items,
        }
    }
}
