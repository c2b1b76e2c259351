//! Public catalog endpoints.
//!
//! Stock changes with every order, so listings are never cached.

use axum::{
    Json,
    extract::State,
    http::header::{CACHE_CONTROL, EXPIRES, PRAGMA},
    response::IntoResponse,
};
use tracing::instrument;

use rigshop_core::ProductId;

use crate::error::{AppError, Result};
use crate::extract::{ApiPath, ApiQuery};
use crate::models::ProductFilter;
use crate::state::AppState;

/// Headers that stop browsers and proxies caching catalog data.
pub const NO_CACHE: [(axum::http::HeaderName, &str); 3] = [
    (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (PRAGMA, "no-cache"),
    (EXPIRES, "0"),
];

/// List products matching the query filters.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<impl IntoResponse> {
    let products = state.store().list_products(&filter).await?;
    Ok((NO_CACHE, Json(products)))
}

/// One product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<impl IntoResponse> {
    let product = state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;
    Ok((NO_CACHE, Json(product)))
}
