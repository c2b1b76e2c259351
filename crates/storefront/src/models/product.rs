//! Catalog products.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigshop_core::{Price, ProductCategory, ProductId};

use super::{ValidationError, non_blank, require};

/// A product on sale in one of the storefront departments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: Price,
    pub category: ProductCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit can be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Fields for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    pub price: Price,
    pub category: ProductCategory,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
}

impl NewProduct {
    /// Check required fields and normalize optional text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank name or negative price.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        require("name", &self.name)?;
        if self.price.is_negative() {
            return Err(ValidationError::new("price cannot be negative"));
        }
        self.name = self.name.trim().to_owned();
        self.description = non_blank(self.description);
        self.brand = non_blank(self.brand);
        self.subcategory = non_blank(self.subcategory);
        self.image_url = non_blank(self.image_url);
        Ok(self)
    }

    /// Build the stored product.
    #[must_use]
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            brand: self.brand,
            price: self.price,
            category: self.category,
            subcategory: self.subcategory,
            stock: self.stock,
            image_url: self.image_url,
            specs: self.specs,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial product update. Absent fields are left alone; blank optional
/// text clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Price>,
    pub category: Option<ProductCategory>,
    pub subcategory: Option<String>,
    pub stock: Option<u32>,
    pub image_url: Option<String>,
    pub specs: Option<BTreeMap<String, String>>,
}

impl ProductUpdate {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank name or negative price.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            require("name", name)?;
        }
        if self.price.is_some_and(|p| p.is_negative()) {
            return Err(ValidationError::new("price cannot be negative"));
        }
        Ok(())
    }

    /// Apply the update to `product`, stamping `updated_at`.
    pub fn apply_to(self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            product.name = name.trim().to_owned();
        }
        if let Some(description) = self.description {
            product.description = non_blank(Some(description));
        }
        if let Some(brand) = self.brand {
            product.brand = non_blank(Some(brand));
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(subcategory) = self.subcategory {
            product.subcategory = non_blank(Some(subcategory));
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = non_blank(Some(image_url));
        }
        if let Some(specs) = self.specs {
            product.specs = specs;
        }
        product.updated_at = now;
    }
}

/// Listing filters, all optional and combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub in_stock: Option<bool>,
    /// Free text matched against name, brand and description.
    pub q: Option<String>,
}

impl ProductFilter {
    /// Whether `product` passes every filter that is set.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        fn same(a: &str, b: &str) -> bool {
            a.trim().eq_ignore_ascii_case(b.trim())
        }

        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        if let Some(sub) = self.subcategory.as_deref()
            && !product.subcategory.as_deref().is_some_and(|s| same(s, sub))
        {
            return false;
        }
        if let Some(brand) = self.brand.as_deref()
            && !product.brand.as_deref().is_some_and(|b| same(b, brand))
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price > max) {
            return false;
        }
        if let Some(in_stock) = self.in_stock
            && product.in_stock() != in_stock
        {
            return false;
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            let haystacks = [
                Some(product.name.as_str()),
                product.brand.as_deref(),
                product.description.as_deref(),
            ];
            if !haystacks
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}
