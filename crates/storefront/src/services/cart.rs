//! Cart operations.
//!
//! Carts are stored whole under a [`CartKey`]. Catalog lookups happen first;
//! the change itself is a single [`update_cart`](crate::db::CartRepository::update_cart)
//! call, so concurrent requests on one cart cannot lose each other's edits.

use thiserror::Error;
use uuid::Uuid;

use rigshop_core::builder::{BuildSelection, ComponentKind};
use rigshop_core::{ProductId, UserId};

use crate::db::{RepositoryError, Store, cart_edit};
use crate::models::{Cart, CartItem, CartKey, ItemRef, Product};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("item is not in the cart")]
    ItemNotInCart,

    /// The build is missing required parts or has compatibility issues.
    #[error("build is not ready: {0}")]
    BuildNotReady(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn product_line(product: &Product, quantity: u32) -> CartItem {
    CartItem {
        item: ItemRef::Product { id: product.id },
        name: product.name.clone(),
        brand: product.brand.clone(),
        price: product.price,
        quantity,
        image_url: product.image_url.clone(),
    }
}

/// Cart service over a store.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be loaded.
    pub async fn get(&self, key: &CartKey) -> Result<Cart, CartError> {
        Ok(self.store.get_cart(key).await?)
    }

    /// Add `quantity` units of a product (default 1). The line never exceeds
    /// the product's stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a quantity below 1,
    /// `CartError::ProductNotFound` for an unknown product and
    /// `CartError::OutOfStock` when no unit is available.
    #[tracing::instrument(skip(self, key), fields(cart = %key))]
    pub async fn add_product(
        &self,
        key: &CartKey,
        product_id: ProductId,
        quantity: Option<i64>,
    ) -> Result<Cart, CartError> {
        let quantity = quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if !product.in_stock() {
            return Err(CartError::OutOfStock(product.name));
        }

        let requested = u32::try_from(quantity).unwrap_or(u32::MAX);
        let edit = cart_edit(move |cart| {
            let item = ItemRef::Product { id: product.id };
            let existing = cart.quantity_of(&item);
            let target = existing.saturating_add(requested).min(product.stock);
            cart.add(product_line(&product, target.saturating_sub(existing)));
            if existing > target {
                cart.set_quantity(&item, i64::from(target));
            }
            Ok(())
        });

        Ok(self.store.update_cart(key, edit).await?)
    }

    /// Add one of every component in a complete, compatible build.
    ///
    /// # Errors
    ///
    /// Returns `CartError::BuildNotReady` when a required part is missing or
    /// the parts do not fit together.
    #[tracing::instrument(skip(self, key, selection), fields(cart = %key))]
    pub async fn add_build(
        &self,
        key: &CartKey,
        selection: &BuildSelection<'_>,
    ) -> Result<Cart, CartError> {
        let summary = selection.summary();
        if !summary.complete {
            let missing: Vec<&str> = ComponentKind::ALL
                .iter()
                .filter(|kind| kind.is_required() && selection.get(**kind).is_none())
                .map(ComponentKind::display_name)
                .collect();
            return Err(CartError::BuildNotReady(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        if !summary.compatible {
            let messages: Vec<String> = summary.issues.iter().map(ToString::to_string).collect();
            return Err(CartError::BuildNotReady(messages.join("; ")));
        }

        let lines: Vec<CartItem> = selection
            .components()
            .map(|(_, component)| CartItem {
                item: ItemRef::Component {
                    id: component.id.clone(),
                },
                name: component.name.clone(),
                brand: Some(component.brand.clone()),
                price: component.price,
                quantity: 1,
                image_url: component.image_url.clone(),
            })
            .collect();
        let edit = cart_edit(move |cart| {
            for line in lines {
                cart.add(line);
            }
            Ok(())
        });

        Ok(self.store.update_cart(key, edit).await?)
    }

    /// Set a line's quantity; zero or less removes it. Product lines are
    /// capped at the available stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotInCart` when the cart has no such line.
    #[tracing::instrument(skip(self, key), fields(cart = %key))]
    pub async fn update_quantity(
        &self,
        key: &CartKey,
        item: &ItemRef,
        quantity: i64,
    ) -> Result<Cart, CartError> {
        let mut quantity = quantity;
        if quantity > 0
            && let Some(id) = item.product_id()
        {
            let stock = self
                .store
                .get_product(id)
                .await?
                .map_or(0, |product| product.stock);
            quantity = quantity.min(i64::from(stock));
        }

        let edit = cart_edit(move |cart| {
            if cart.quantity_of(item) == 0 {
                return Err(RepositoryError::NotFound);
            }
            cart.set_quantity(item, quantity);
            Ok(())
        });

        match self.store.update_cart(key, edit).await {
            Err(RepositoryError::NotFound) => Err(CartError::ItemNotInCart),
            other => Ok(other?),
        }
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` on storage failure.
    pub async fn remove(&self, key: &CartKey, item: &ItemRef) -> Result<Cart, CartError> {
        let edit = cart_edit(move |cart| {
            cart.remove(item);
            Ok(())
        });
        Ok(self.store.update_cart(key, edit).await?)
    }

    /// # Errors
    ///
    /// Returns `CartError::Repository` on storage failure.
    pub async fn clear(&self, key: &CartKey) -> Result<(), CartError> {
        self.store.delete_cart(key).await?;
        Ok(())
    }

    /// Move a guest cart into a user's cart and delete the guest cart.
    ///
    /// The guest cart is taken out of storage first, so a line is merged at
    /// most once. If the merge cannot be saved, the lines go back to the guest
    /// cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` on storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn merge_guest(&self, guest: Uuid, user: UserId) -> Result<Cart, CartError> {
        let guest_key = CartKey::Guest(guest);
        let user_key = CartKey::User(user);

        let guest_cart = self.store.delete_cart(&guest_key).await?;
        if guest_cart.is_empty() {
            return Ok(self.store.get_cart(&user_key).await?);
        }

        let taken = guest_cart.clone();
        let merged = self
            .store
            .update_cart(
                &user_key,
                cart_edit(move |cart| {
                    cart.merge(taken);
                    Ok(())
                }),
            )
            .await;

        match merged {
            Ok(cart) => {
                tracing::info!(items = cart.item_count(), "Merged guest cart");
                Ok(cart)
            }
            Err(e) => {
                let restore = cart_edit(move |cart| {
                    cart.merge(guest_cart);
                    Ok(())
                });
                if let Err(restore_err) = self.store.update_cart(&guest_key, restore).await {
                    tracing::error!(error = %restore_err, "Failed to restore guest cart");
                }
                Err(e.into())
            }
        }
    }
}
