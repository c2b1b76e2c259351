//! Domain models for the storefront.
//!
//! These are the validated types the services and repositories exchange.
//! Row types for `PostgreSQL` and record types for the JSON store live next
//! to their backends and convert into these.

pub mod cart;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartKey, CartSummary, ItemRef};
pub use order::{NewOrder, Order, OrderItem, ShippingAddress};
pub use product::{NewProduct, Product, ProductFilter, ProductUpdate};
pub use user::{NewUser, User, UserUpdate};

/// A request field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim `value`, mapping blank strings to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Require a non-blank string field.
pub(crate) fn require(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    Ok(())
}
