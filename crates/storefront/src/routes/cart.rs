//! Cart endpoints.
//!
//! Guests are tracked by `X-Cart-Id`; every response hands the ID back.
//! Every mutation returns the whole cart.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use rigshop_core::ProductId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::ApiJson;
use crate::middleware::{CartIdHeader, CartOwner};
use crate::models::{Cart, CartSummary, ItemRef};
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub item: ItemRef,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub item: ItemRef,
}

fn respond(owner: &CartOwner, cart: Cart) -> (CartIdHeader, Json<CartSummary>) {
    (owner.cart_id_header(), Json(CartSummary::from(cart)))
}

#[instrument(skip_all, fields(cart = %owner.key))]
pub async fn show(State(state): State<AppState>, owner: CartOwner) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store()).get(&owner.key).await?;
    Ok(respond(&owner, cart))
}

#[instrument(skip(state, owner), fields(cart = %owner.key))]
pub async fn add_item(
    State(state): State<AppState>,
    owner: CartOwner,
    ApiJson(request): ApiJson<AddItemRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .add_product(&owner.key, request.product_id, request.quantity)
        .await?;
    let product_id = request.product_id.to_string();
    add_breadcrumb("cart", "Added product", Some(&[("product_id", product_id.as_str())]));
    Ok(respond(&owner, cart))
}

#[instrument(skip(state, owner), fields(cart = %owner.key))]
pub async fn update_item(
    State(state): State<AppState>,
    owner: CartOwner,
    ApiJson(request): ApiJson<UpdateItemRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .update_quantity(&owner.key, &request.item, request.quantity)
        .await?;
    Ok(respond(&owner, cart))
}

#[instrument(skip(state, owner), fields(cart = %owner.key))]
pub async fn remove_item(
    State(state): State<AppState>,
    owner: CartOwner,
    ApiJson(request): ApiJson<RemoveItemRequest>,
) -> Result<impl IntoResponse> {
    let cart = CartService::new(state.store())
        .remove(&owner.key, &request.item)
        .await?;
    Ok(respond(&owner, cart))
}

#[instrument(skip_all, fields(cart = %owner.key))]
pub async fn clear(State(state): State<AppState>, owner: CartOwner) -> Result<impl IntoResponse> {
    CartService::new(state.store()).clear(&owner.key).await?;
    Ok(respond(&owner, Cart::default()))
}
