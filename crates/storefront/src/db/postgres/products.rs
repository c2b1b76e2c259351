//! Product queries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use rigshop_core::{Price, ProductCategory, ProductId};

use super::{PgStore, count};
use crate::db::{ProductRepository, RepositoryError};
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};

pub(super) const PRODUCT_COLUMNS: &str = "id, name, description, brand, price, category, \
     subcategory, stock, image_url, specs, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: Option<String>,
    brand: Option<String>,
    price: Price,
    category: ProductCategory,
    subcategory: Option<String>,
    stock: i32,
    image_url: Option<String>,
    specs: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative stock for product {}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            brand: row.brand,
            price: row.price,
            category: row.category,
            subcategory: row.subcategory,
            stock,
            image_url: row.image_url,
            specs: row.specs.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn stock_param(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock).map_err(|_| RepositoryError::Conflict("stock is too large".to_owned()))
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn filtered_query(filter: &ProductFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

    if let Some(category) = filter.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(sub) = filter.subcategory.as_deref() {
        qb.push(" AND lower(subcategory) = lower(")
            .push_bind(sub.trim().to_owned())
            .push(")");
    }
    if let Some(brand) = filter.brand.as_deref() {
        qb.push(" AND lower(brand) = lower(")
            .push_bind(brand.trim().to_owned())
            .push(")");
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND price <= ").push_bind(max);
    }
    match filter.in_stock {
        Some(true) => {
            qb.push(" AND stock > 0");
        }
        Some(false) => {
            qb.push(" AND stock = 0");
        }
        None => {}
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = like_pattern(q);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb.push(" ORDER BY id");
    qb
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = filtered_query(filter)
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products
                (name, description, brand, price, category, subcategory, stock, image_url, specs)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.category)
        .bind(&product.subcategory)
        .bind(stock_param(product.stock)?)
        .bind(&product.image_url)
        .bind(Json(&product.specs))
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut product = Product::try_from(row)?;
        update.apply_to(&mut product, Utc::now());

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = $2, description = $3, brand = $4, price = $5, category = $6,
                subcategory = $7, stock = $8, image_url = $9, specs = $10, updated_at = $11
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.price)
        .bind(product.category)
        .bind(&product.subcategory)
        .bind(stock_param(product.stock)?)
        .bind(&product.image_url)
        .bind(Json(&product.specs))
        .bind(product.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_products_by_category(
        &self,
    ) -> Result<BTreeMap<ProductCategory, u64>, RepositoryError> {
        let rows = sqlx::query_as::<_, (ProductCategory, i64)>(
            "SELECT category, COUNT(*) FROM products GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(c, n)| (c, count(n))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rtx"), "%rtx%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }

    #[test]
    fn test_filtered_query_sql() {
        let filter = ProductFilter {
            category: Some(ProductCategory::Parts),
            in_stock: Some(true),
            q: Some("ssd".to_owned()),
            ..ProductFilter::default()
        };
        let qb = filtered_query(&filter);
        let sql = qb.sql();
        assert!(sql.contains("category = $1"));
        assert!(sql.contains("stock > 0"));
        assert!(sql.contains("name ILIKE $2"));
        assert!(sql.ends_with("ORDER BY id"));
    }
}
